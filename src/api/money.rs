//! Money fields arrive either as JSON numbers or as decimal strings ("250.00").

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Amount {
    Number(f64),
    Text(String),
}

impl Amount {
    fn into_f64<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            Amount::Number(n) => Ok(n),
            Amount::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("invalid amount: {:?}", s))),
        }
    }
}

pub(crate) fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Amount::deserialize(deserializer)?.into_f64()
}

pub(crate) fn opt_number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Amount>::deserialize(deserializer)? {
        Some(amount) => amount.into_f64().map(Some),
        None => Ok(None),
    }
}
