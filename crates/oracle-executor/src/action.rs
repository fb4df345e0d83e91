//! Venue action types.
//!
//! Actions are a closed set. The only one the relay emits is
//! `perpDeploy.setOracle`:
//!
//! ```json
//! {"type":"perpDeploy","setOracle":{"dex":"XAU","oraclePxs":[["XAU-TEST","1924.55"]],
//!  "markPxs":[],"externalPerpPxs":[["XAU-TEST","1924.55"]]}}
//! ```
//!
//! IMPORTANT: serialization order is part of the signed payload. Keys are
//! emitted in declaration order and price lists are sorted by symbol when
//! they are built, so the msgpack bytes are stable.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::ActionError;

/// `perpDeploy` action type tag.
pub const PERP_DEPLOY_TYPE: &str = "perpDeploy";

/// `[symbol, price]` pairs sorted lexicographically by symbol.
///
/// Encodes as an array of 2-element arrays in both JSON and msgpack.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct SortedPxs(Vec<(String, String)>);

impl SortedPxs {
    /// Build from unordered pairs.
    ///
    /// # Errors
    /// - empty symbol
    /// - empty, non-numeric or non-positive price string
    /// - the same symbol twice
    pub fn new<I, K, V>(pairs: I) -> Result<Self, ActionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entries: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        for (symbol, px) in &entries {
            if symbol.trim().is_empty() {
                return Err(ActionError::EmptySymbol);
            }
            let positive = Decimal::from_str(px).map_or(false, |d| d > Decimal::ZERO);
            if !positive {
                return Err(ActionError::InvalidPrice {
                    symbol: symbol.clone(),
                    px: px.clone(),
                });
            }
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));

        if let Some(pair) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(ActionError::DuplicateSymbol(pair[0].0.clone()));
        }

        Ok(Self(entries))
    }

    /// Single `[symbol, price]` entry.
    pub fn single(symbol: impl Into<String>, px: impl Into<String>) -> Result<Self, ActionError> {
        Self::new([(symbol.into(), px.into())])
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn get(&self, symbol: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, px)| px.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// `setOracle` payload.
///
/// Field order must match the venue SDK: dex -> oraclePxs -> markPxs -> externalPerpPxs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetOracle {
    pub dex: String,
    pub oracle_pxs: SortedPxs,
    /// One price list per mark source; usually empty.
    pub mark_pxs: Vec<SortedPxs>,
    pub external_perp_pxs: SortedPxs,
}

impl SetOracle {
    pub fn new(
        dex: impl Into<String>,
        oracle_pxs: SortedPxs,
        mark_pxs: Vec<SortedPxs>,
        external_perp_pxs: SortedPxs,
    ) -> Result<Self, ActionError> {
        let dex = dex.into();
        if dex.trim().is_empty() {
            return Err(ActionError::EmptyDex);
        }
        if oracle_pxs.is_empty() {
            return Err(ActionError::NoOraclePrices);
        }
        Ok(Self {
            dex,
            oracle_pxs,
            mark_pxs,
            external_perp_pxs,
        })
    }

    /// Oracle and external-perp price set to the same value, no mark prices.
    pub fn single_price(
        dex: impl Into<String>,
        coin: impl Into<String>,
        px: impl Into<String>,
    ) -> Result<Self, ActionError> {
        let coin = coin.into();
        let px = px.into();
        let oracle_pxs = SortedPxs::single(coin.clone(), px.clone())?;
        let external_perp_pxs = SortedPxs::single(coin, px)?;
        Self::new(dex, oracle_pxs, Vec::new(), external_perp_pxs)
    }
}

/// Venue action (part of the signing input).
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetOracle(SetOracle),
}

impl Action {
    /// Value of the `type` tag.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::SetOracle(_) => PERP_DEPLOY_TYPE,
        }
    }
}

impl From<SetOracle> for Action {
    fn from(value: SetOracle) -> Self {
        Self::SetOracle(value)
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::SetOracle(set_oracle) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", PERP_DEPLOY_TYPE)?;
                map.serialize_entry("setOracle", set_oracle)?;
                map.end()
            }
        }
    }
}
