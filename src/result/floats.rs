//! Lossless JSON round-tripping for floats that may be non-finite.
//!
//! `serde_json` writes `NaN` and infinities as `null`, which cannot be
//! read back. The helper modules here keep finite values as plain JSON
//! numbers and spell non-finite ones as the strings `"nan"`, `"inf"`,
//! and `"-inf"`. Apply them with `#[serde(with = ...)]` to fields that
//! can legitimately hold such values (failed-start objective values,
//! gradients with unset fixed coordinates, profile path vectors).

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use crate::types::Gradient;

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum JsonF64 {
    Number(f64),
    Named(String),
}

fn encode(value: f64) -> JsonF64 {
    if value.is_finite() {
        JsonF64::Number(value)
    } else if value.is_nan() {
        JsonF64::Named(String::from("nan"))
    } else if value > 0.0 {
        JsonF64::Named(String::from("inf"))
    } else {
        JsonF64::Named(String::from("-inf"))
    }
}

fn decode(value: JsonF64) -> Result<f64, String> {
    match value {
        JsonF64::Number(v) => Ok(v),
        JsonF64::Named(name) => match name.as_str() {
            "nan" => Ok(f64::NAN),
            "inf" => Ok(f64::INFINITY),
            "-inf" => Ok(f64::NEG_INFINITY),
            other => Err(format!("expected \"nan\", \"inf\" or \"-inf\", got \"{other}\"")),
        },
    }
}

/// A single possibly non-finite `f64`.
pub(crate) mod float {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        encode(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        decode(JsonF64::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

/// A vector of possibly non-finite `f64`s.
pub(crate) mod float_vec {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<JsonF64> = values.iter().map(|&v| encode(v)).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Vec::<JsonF64>::deserialize(deserializer)?
            .into_iter()
            .map(|v| decode(v).map_err(D::Error::custom))
            .collect()
    }
}

/// An optional gradient whose fixed coordinates hold `NaN`.
pub(crate) mod opt_grad {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<Gradient>, serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .as_ref()
            .map(|grad| grad.iter().map(|&v| encode(v)).collect::<Vec<JsonF64>>())
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Gradient>, D::Error> {
        match Option::<Vec<JsonF64>>::deserialize(deserializer)? {
            Some(values) => {
                let decoded: Result<Vec<f64>, String> = values.into_iter().map(decode).collect();
                Ok(Some(Gradient::from_vec(decoded.map_err(D::Error::custom)?)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Round-tripping finite, infinite, and NaN values through JSON.
    //
    // They intentionally DO NOT cover:
    // - The result containers that use these helpers (store tests).
    // -------------------------------------------------------------------------

    #[derive(Serialize, Deserialize)]
    struct Record {
        #[serde(with = "float")]
        fval: f64,
        #[serde(with = "float_vec")]
        path: Vec<f64>,
        #[serde(with = "opt_grad")]
        grad: Option<Gradient>,
    }

    #[test]
    // Purpose
    // -------
    // Non-finite floats must survive a JSON round trip instead of
    // degrading to null.
    //
    // Given
    // -----
    // - A record with an infinite value, a NaN-bearing path, and a
    //   gradient with a NaN coordinate.
    //
    // Expect
    // ------
    // - The parsed record reproduces every value, NaN included, and the
    //   JSON text never contains null.
    fn non_finite_floats_survive_the_round_trip() {
        // Arrange
        let record = Record {
            fval: f64::INFINITY,
            path: vec![1.5, f64::NAN, f64::NEG_INFINITY],
            grad: Some(array![0.25, f64::NAN]),
        };

        // Act
        let text = serde_json::to_string(&record).expect("serializable");
        let parsed: Record = serde_json::from_str(&text).expect("parseable");

        // Assert
        assert!(!text.contains("null"));
        assert!(parsed.fval.is_infinite() && parsed.fval > 0.0);
        assert_eq!(parsed.path[0], 1.5);
        assert!(parsed.path[1].is_nan());
        assert_eq!(parsed.path[2], f64::NEG_INFINITY);
        let grad = parsed.grad.expect("gradient present");
        assert_eq!(grad[0], 0.25);
        assert!(grad[1].is_nan());
    }

    #[test]
    // Purpose
    // -------
    // Unknown string spellings must be rejected, not silently mapped.
    //
    // Given
    // -----
    // - JSON holding "infinity" in a lossless float field.
    //
    // Expect
    // ------
    // - Deserialization fails.
    fn unknown_spellings_are_rejected() {
        // Arrange
        let text = r#"{"fval": "infinity", "path": [], "grad": null}"#;

        // Act
        let parsed: Result<Record, _> = serde_json::from_str(text);

        // Assert
        assert!(parsed.is_err());
    }
}
