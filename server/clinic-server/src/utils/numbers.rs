//! Lenient numeric fields
//!
//! Form inputs reach the API as strings (`"12"`, `"50000.5"`, `""`) as often
//! as JSON numbers. These deserializers accept both and turn blanks and
//! unparseable text into `None`, so validation reports the missing value
//! with its own message.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NumberOrText {
    fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrText::Int(i) => Some(*i as f64),
            NumberOrText::Float(f) => Some(*f),
            NumberOrText::Text(s) => s.trim().parse::<f64>().ok(),
        }
        .filter(|v| v.is_finite())
    }

    /// Integer part, the way a form's quantity box is read
    fn as_i32(&self) -> Option<i32> {
        match self {
            NumberOrText::Int(i) => i32::try_from(*i).ok(),
            other => other
                .as_f64()
                .map(f64::trunc)
                .filter(|v| *v >= f64::from(i32::MIN) && *v <= f64::from(i32::MAX))
                .map(|v| v as i32),
        }
    }
}

/// `Option<i32>` from a number or numeric string
pub fn lenient_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(NumberOrText::as_i32))
}

/// `Option<f64>` from a number or numeric string
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(NumberOrText::as_f64))
}

/// Round a money amount to cents
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Payload {
        #[serde(default, deserialize_with = "lenient_i32")]
        cantidad: Option<i32>,
        #[serde(default, deserialize_with = "lenient_f64")]
        valor: Option<f64>,
    }

    fn parse(json: &str) -> Payload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_numbers_and_strings() {
        let p = parse(r#"{"cantidad": 3, "valor": 50000}"#);
        assert_eq!((p.cantidad, p.valor), (Some(3), Some(50000.0)));

        let p = parse(r#"{"cantidad": "12", "valor": "1250.50"}"#);
        assert_eq!((p.cantidad, p.valor), (Some(12), Some(1250.5)));
    }

    #[test]
    fn test_integer_part_of_decimal_quantity() {
        let p = parse(r#"{"cantidad": "2.9"}"#);
        assert_eq!(p.cantidad, Some(2));
    }

    #[test]
    fn test_blank_null_and_missing() {
        let p = parse(r#"{"cantidad": "", "valor": null}"#);
        assert_eq!((p.cantidad, p.valor), (None, None));

        let p = parse("{}");
        assert_eq!((p.cantidad, p.valor), (None, None));
    }

    #[test]
    fn test_garbage_is_none() {
        let p = parse(r#"{"cantidad": "muchos", "valor": "abc"}"#);
        assert_eq!((p.cantidad, p.valor), (None, None));

        let p = parse(r#"{"cantidad": 99999999999}"#);
        assert_eq!(p.cantidad, None);
    }

    #[test]
    fn test_round_money() {
        assert_eq!(round_money(0.1 + 0.2), 0.3);
        assert_eq!(round_money(3.0 * 33.333), 100.0);
    }

    proptest! {
        #[test]
        fn prop_quantity_text_matches_number(n in any::<i32>()) {
            let p = parse(&format!(r#"{{"cantidad": "{}"}}"#, n));
            prop_assert_eq!(p.cantidad, Some(n));

            let p = parse(&format!(r#"{{"cantidad": {}}}"#, n));
            prop_assert_eq!(p.cantidad, Some(n));
        }

        #[test]
        fn prop_round_money_is_stable(cents in -1_000_000_000i64..1_000_000_000i64) {
            let value = cents as f64 / 100.0;
            prop_assert_eq!(round_money(round_money(value)), round_money(value));
        }
    }
}
