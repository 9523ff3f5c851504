//! Single-line transfer strings for level layouts.
//!
//! A layout is encoded as `level:v1:<columns>x<rows>:<payload>` where the
//! payload is the base64 encoded JSON of the tiles, waypoints and cell size.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use essence_defence_core::{CellCoord, LayoutError, LevelLayout, TileKind, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const TRANSFER_DOMAIN: &str = "level";
const TRANSFER_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded layout payload.
pub(crate) const TRANSFER_HEADER: &str = "level:v1";
/// Delimiter used to separate the prefix, grid dimensions and payload.
const FIELD_DELIMITER: char = ':';

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Payload {
    cell_size: f32,
    #[serde(default)]
    origin: Vec3,
    tiles: Vec<TileKind>,
    waypoints: Vec<CellCoord>,
}

/// Encodes a layout into a single-line string suitable for clipboard transfer.
pub(crate) fn encode(layout: &LevelLayout) -> Result<String, LayoutTransferError> {
    let payload = Payload {
        cell_size: layout.cell_size,
        origin: layout.origin,
        tiles: layout.tiles.clone(),
        waypoints: layout.waypoints.clone(),
    };
    let json = serde_json::to_vec(&payload).map_err(LayoutTransferError::Serialize)?;
    let encoded = STANDARD_NO_PAD.encode(json);
    Ok(format!(
        "{TRANSFER_HEADER}:{}x{}:{encoded}",
        layout.columns, layout.rows
    ))
}

/// Decodes and validates a layout from its transfer string.
pub(crate) fn decode(value: &str) -> Result<LevelLayout, LayoutTransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LayoutTransferError::EmptyPayload);
    }

    let mut parts = trimmed.split(FIELD_DELIMITER);
    let domain = parts.next().ok_or(LayoutTransferError::MissingPrefix)?;
    let version = parts.next().ok_or(LayoutTransferError::MissingVersion)?;
    let dimensions = parts
        .next()
        .ok_or(LayoutTransferError::MissingDimensions)?;
    let payload = parts.next().ok_or(LayoutTransferError::MissingPayload)?;

    if domain != TRANSFER_DOMAIN {
        return Err(LayoutTransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != TRANSFER_VERSION {
        return Err(LayoutTransferError::UnsupportedVersion(version.to_owned()));
    }

    let (columns, rows) = parse_dimensions(dimensions)?;
    let bytes = STANDARD_NO_PAD
        .decode(payload.as_bytes())
        .map_err(LayoutTransferError::InvalidEncoding)?;
    let decoded: Payload =
        serde_json::from_slice(&bytes).map_err(LayoutTransferError::InvalidPayload)?;

    let layout = LevelLayout {
        columns,
        rows,
        cell_size: decoded.cell_size,
        origin: decoded.origin,
        tiles: decoded.tiles,
        waypoints: decoded.waypoints,
    };
    layout.validate()?;
    Ok(layout)
}

/// Errors that can occur while encoding or decoding layout transfer strings.
#[derive(Debug, Error)]
pub(crate) enum LayoutTransferError {
    /// The provided string was empty or contained only whitespace.
    #[error("layout string was empty")]
    EmptyPayload,
    /// The prefix segment was missing.
    #[error("layout string is missing the prefix")]
    MissingPrefix,
    /// The version segment was missing.
    #[error("layout string is missing the version")]
    MissingVersion,
    /// The grid dimensions were missing.
    #[error("layout string is missing the grid dimensions")]
    MissingDimensions,
    /// The payload segment was missing.
    #[error("layout string is missing the payload")]
    MissingPayload,
    /// The prefix segment named another domain.
    #[error("layout prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The version segment is not understood.
    #[error("layout version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The grid dimensions could not be parsed.
    #[error("could not parse grid dimensions '{0}'")]
    InvalidDimensions(String),
    /// The base64 payload could not be decoded.
    #[error("could not decode layout payload: {0}")]
    InvalidEncoding(#[source] base64::DecodeError),
    /// The decoded payload could not be deserialised.
    #[error("could not parse layout payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),
    /// The layout could not be serialised.
    #[error("could not serialise layout: {0}")]
    Serialize(#[source] serde_json::Error),
    /// The decoded layout is inconsistent.
    #[error("decoded layout is invalid: {0}")]
    InvalidLayout(#[from] LayoutError),
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), LayoutTransferError> {
    let invalid = || LayoutTransferError::InvalidDimensions(dimensions.to_owned());
    let (columns, rows) = dimensions.split_once(['x', 'X']).ok_or_else(invalid)?;

    let columns = columns.trim().parse::<u32>().map_err(|_| invalid())?;
    let rows = rows.trim().parse::<u32>().map_err(|_| invalid())?;

    if columns == 0 || rows == 0 {
        return Err(invalid());
    }

    Ok((columns, rows))
}
