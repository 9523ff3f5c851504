//! Persisted level layouts produced by the level editor.
//!
//! A layout is stored as a flattened row-major tile list together with its
//! dimensions and the ordered waypoint list enemies follow.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CellCoord;

/// Authoring classification of a single grid tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    /// Neither walkable nor buildable.
    Blocked,
    /// Walkable path tile.
    Path,
    /// Tile that may host a tower.
    Buildable,
    /// Walkable tile where enemies enter the level.
    Spawn,
    /// Walkable tile hosting the core enemies attack.
    Core,
}

impl TileKind {
    /// Reports whether enemies may traverse the tile.
    #[must_use]
    pub const fn walkable(self) -> bool {
        matches!(self, Self::Path | Self::Spawn | Self::Core)
    }

    /// Reports whether a tower may be placed on the tile.
    #[must_use]
    pub const fn buildable(self) -> bool {
        matches!(self, Self::Buildable)
    }

    /// Special role carried by the tile.
    #[must_use]
    pub const fn marker(self) -> CellMarker {
        match self {
            Self::Spawn => CellMarker::Spawn,
            Self::Core => CellMarker::Target,
            Self::Blocked | Self::Path | Self::Buildable => CellMarker::None,
        }
    }

    /// Single character used by the plain-text layout format.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Blocked => '#',
            Self::Path => '.',
            Self::Buildable => 'B',
            Self::Spawn => 'S',
            Self::Core => 'C',
        }
    }

    /// Parses a plain-text layout symbol.
    #[must_use]
    pub const fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '#' => Some(Self::Blocked),
            '.' => Some(Self::Path),
            'B' => Some(Self::Buildable),
            'S' => Some(Self::Spawn),
            'C' => Some(Self::Core),
            _ => None,
        }
    }
}

/// Special role a cell plays in the level. A cell carries at most one marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellMarker {
    /// Ordinary cell.
    None,
    /// Enemies enter the level here.
    Spawn,
    /// The core enemies path toward.
    Target,
}

/// Reasons a persisted layout fails to load.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum LayoutError {
    /// The layout has no rows or no columns.
    #[error("layout must contain at least one row and one column")]
    EmptyGrid,
    /// The flattened list length disagrees with the dimensions.
    #[error("expected {expected} tiles but found {actual}")]
    SizeMismatch {
        /// Tile count implied by the dimensions.
        expected: usize,
        /// Tile count actually provided.
        actual: usize,
    },
    /// A row differs in width from the first row.
    #[error("row {row} has {actual} tiles, expected {expected}")]
    RaggedRow {
        /// Zero-based index of the offending row.
        row: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        actual: usize,
    },
    /// A plain-text layout used a symbol outside the tile alphabet.
    #[error("unknown tile symbol {symbol:?} at row {row}, column {column}")]
    UnknownSymbol {
        /// Offending character.
        symbol: char,
        /// Zero-based row of the character.
        row: usize,
        /// Zero-based column of the character.
        column: usize,
    },
    /// The layout declares no spawn tile.
    #[error("layout has no spawn tile")]
    NoSpawn,
    /// The layout declares no core tile.
    #[error("layout has no core tile")]
    NoCore,
    /// The waypoint list is empty.
    #[error("layout has no waypoints")]
    NoWaypoints,
    /// A waypoint lies outside the grid.
    #[error("waypoint {0:?} lies outside the grid")]
    WaypointOutOfBounds(CellCoord),
    /// A waypoint lies on a tile enemies cannot walk on.
    #[error("waypoint {0:?} is not walkable")]
    WaypointNotWalkable(CellCoord),
}

/// Level layout: dimensions, flattened row-major tiles and waypoint list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelLayout {
    /// Number of cell columns.
    pub columns: u32,
    /// Number of cell rows.
    pub rows: u32,
    /// Edge length of a square cell in world units.
    pub cell_size: f32,
    /// World-space center of the grid.
    #[serde(default)]
    pub origin: Vec3,
    /// Row-major tile list of length `columns * rows`.
    pub tiles: Vec<TileKind>,
    /// Ordered cells enemies walk through after spawning.
    pub waypoints: Vec<CellCoord>,
}

impl LevelLayout {
    /// Builds a layout from nested rows of tiles.
    pub fn from_rows(
        rows: &[Vec<TileKind>],
        cell_size: f32,
        waypoints: Vec<CellCoord>,
    ) -> Result<Self, LayoutError> {
        let width = rows.first().map_or(0, Vec::len);
        if rows.is_empty() || width == 0 {
            return Err(LayoutError::EmptyGrid);
        }

        for (index, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(LayoutError::RaggedRow {
                    row: index,
                    expected: width,
                    actual: row.len(),
                });
            }
        }

        Ok(Self {
            columns: dimension(width)?,
            rows: dimension(rows.len())?,
            cell_size,
            origin: Vec3::ZERO,
            tiles: flatten(rows),
            waypoints,
        })
    }

    /// Parses the plain-text format: one line per row, one symbol per tile.
    pub fn parse(
        text: &str,
        cell_size: f32,
        waypoints: Vec<CellCoord>,
    ) -> Result<Self, LayoutError> {
        let mut rows = Vec::new();
        for (row_index, line) in text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
        {
            let mut row = Vec::with_capacity(line.len());
            for (column, symbol) in line.chars().enumerate() {
                let tile = TileKind::from_symbol(symbol).ok_or(LayoutError::UnknownSymbol {
                    symbol,
                    row: row_index,
                    column,
                })?;
                row.push(tile);
            }
            rows.push(row);
        }

        Self::from_rows(&rows, cell_size, waypoints)
    }

    /// Renders the layout back into the plain-text format.
    #[must_use]
    pub fn render(&self) -> String {
        let width = usize::try_from(self.columns).unwrap_or(0).max(1);
        self.tiles
            .chunks(width)
            .map(|row| row.iter().map(|tile| tile.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Returns the tile stored at the provided cell.
    #[must_use]
    pub fn tile(&self, cell: CellCoord) -> Option<TileKind> {
        if cell.column() >= self.columns || cell.row() >= self.rows {
            return None;
        }
        let index = usize::try_from(cell.row()).ok()? * usize::try_from(self.columns).ok()?
            + usize::try_from(cell.column()).ok()?;
        self.tiles.get(index).copied()
    }

    /// Reconstructs nested rows from the flattened tile list.
    pub fn to_rows(&self) -> Result<Vec<Vec<TileKind>>, LayoutError> {
        unflatten(&self.tiles, self.rows, self.columns)
    }

    /// Checks dimensions, markers and waypoints for consistency.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let _ = self.to_rows()?;

        if !self.tiles.iter().any(|tile| *tile == TileKind::Spawn) {
            return Err(LayoutError::NoSpawn);
        }
        if !self.tiles.iter().any(|tile| *tile == TileKind::Core) {
            return Err(LayoutError::NoCore);
        }
        if self.waypoints.is_empty() {
            return Err(LayoutError::NoWaypoints);
        }

        for waypoint in &self.waypoints {
            let tile = self
                .tile(*waypoint)
                .ok_or(LayoutError::WaypointOutOfBounds(*waypoint))?;
            if !tile.walkable() {
                return Err(LayoutError::WaypointNotWalkable(*waypoint));
            }
        }

        Ok(())
    }
}

/// Flattens nested rows into a single row-major list.
#[must_use]
pub fn flatten<T: Clone>(rows: &[Vec<T>]) -> Vec<T> {
    rows.iter().flat_map(|row| row.iter().cloned()).collect()
}

/// Splits a row-major list into `rows` rows of `columns` entries.
pub fn unflatten<T: Clone>(
    list: &[T],
    rows: u32,
    columns: u32,
) -> Result<Vec<Vec<T>>, LayoutError> {
    if rows == 0 || columns == 0 {
        return Err(LayoutError::EmptyGrid);
    }

    let width = usize::try_from(columns).map_err(|_| LayoutError::EmptyGrid)?;
    let height = usize::try_from(rows).map_err(|_| LayoutError::EmptyGrid)?;
    let expected = width.saturating_mul(height);
    if list.len() != expected {
        return Err(LayoutError::SizeMismatch {
            expected,
            actual: list.len(),
        });
    }

    Ok(list.chunks(width).map(<[T]>::to_vec).collect())
}

fn dimension(value: usize) -> Result<u32, LayoutError> {
    u32::try_from(value).map_err(|_| LayoutError::SizeMismatch {
        expected: u32::MAX as usize,
        actual: value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "
        S..B
        B#.B
        BB.C
    ";

    fn sample_waypoints() -> Vec<CellCoord> {
        vec![
            CellCoord::new(2, 0),
            CellCoord::new(2, 2),
            CellCoord::new(3, 2),
        ]
    }

    #[test]
    fn flatten_then_unflatten_reproduces_every_cell() {
        let layout = LevelLayout::parse(SAMPLE, 1.0, sample_waypoints()).expect("valid layout");
        let rows = layout.to_rows().expect("dimensions match");

        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.len() == 4));
        assert_eq!(rows[0][0], TileKind::Spawn);
        assert_eq!(rows[1][1], TileKind::Blocked);
        assert_eq!(rows[2][3], TileKind::Core);
        assert_eq!(flatten(&rows), layout.tiles);
    }

    #[test]
    fn unflatten_rejects_mismatched_dimensions() {
        let list = vec![1, 2, 3, 4, 5];
        assert_eq!(
            unflatten(&list, 2, 3),
            Err(LayoutError::SizeMismatch {
                expected: 6,
                actual: 5,
            })
        );
        assert_eq!(unflatten(&list, 0, 5), Err(LayoutError::EmptyGrid));
    }

    #[test]
    fn flatten_round_trip_holds_for_arbitrary_lists() {
        let list: Vec<u32> = (0..12).collect();
        for (rows, columns) in [(1, 12), (2, 6), (3, 4), (12, 1)] {
            let nested = unflatten(&list, rows, columns).expect("matching size");
            assert_eq!(nested.len(), rows as usize);
            assert_eq!(flatten(&nested), list);
        }
    }

    #[test]
    fn render_matches_parsed_text() {
        let layout = LevelLayout::parse(SAMPLE, 1.0, sample_waypoints()).expect("valid layout");
        assert_eq!(layout.render(), "S..B\nB#.B\nBB.C");
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let result = LevelLayout::parse("S..\nB.\n", 1.0, Vec::new());
        assert_eq!(
            result,
            Err(LayoutError::RaggedRow {
                row: 1,
                expected: 3,
                actual: 2,
            })
        );
    }

    #[test]
    fn unknown_symbols_report_their_position() {
        let result = LevelLayout::parse("S.x\n", 1.0, Vec::new());
        assert_eq!(
            result,
            Err(LayoutError::UnknownSymbol {
                symbol: 'x',
                row: 0,
                column: 2,
            })
        );
    }

    #[test]
    fn validation_checks_markers_and_waypoints() {
        let layout = LevelLayout::parse(SAMPLE, 1.0, sample_waypoints()).expect("valid layout");
        assert_eq!(layout.validate(), Ok(()));

        let no_core = LevelLayout::parse("S..\n", 1.0, vec![CellCoord::new(1, 0)]).expect("parses");
        assert_eq!(no_core.validate(), Err(LayoutError::NoCore));

        let mut blocked_waypoint = layout.clone();
        blocked_waypoint.waypoints = vec![CellCoord::new(1, 1)];
        assert_eq!(
            blocked_waypoint.validate(),
            Err(LayoutError::WaypointNotWalkable(CellCoord::new(1, 1)))
        );

        let mut outside = layout;
        outside.waypoints = vec![CellCoord::new(9, 9)];
        assert_eq!(
            outside.validate(),
            Err(LayoutError::WaypointOutOfBounds(CellCoord::new(9, 9)))
        );
    }

    #[test]
    fn tile_markers_are_mutually_exclusive() {
        for tile in [
            TileKind::Blocked,
            TileKind::Path,
            TileKind::Buildable,
            TileKind::Spawn,
            TileKind::Core,
        ] {
            assert_eq!(TileKind::from_symbol(tile.symbol()), Some(tile));
            assert!(!(tile.walkable() && tile.buildable()));
        }
        assert_eq!(TileKind::Spawn.marker(), CellMarker::Spawn);
        assert_eq!(TileKind::Core.marker(), CellMarker::Target);
    }
}
