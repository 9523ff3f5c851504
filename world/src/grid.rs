//! Level grid: static cell flags and dynamic tower occupancy.
//!
//! Cells live in a dense row-major arena indexed by `(x, y)`. The grid lies on
//! the world XZ plane: columns advance along +X and rows along +Z, centered on
//! the layout origin.

use essence_defence_core::{
    CellCoord, CellMarker, LevelLayout, PlacementError, TileKind, TowerId, Vec3,
};

/// Neighbourhood used by [`GridModel::neighbors`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Connectivity {
    /// Orthogonal neighbours only.
    Four,
    /// Orthogonal and diagonal neighbours.
    Eight,
}

const FOUR_OFFSETS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];
const EIGHT_OFFSETS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Single cell of the level grid.
#[derive(Clone, Debug, PartialEq)]
pub struct GridCell {
    coord: CellCoord,
    position: Vec3,
    walkable: bool,
    buildable: bool,
    marker: CellMarker,
    waypoint: bool,
    occupant: Option<TowerId>,
}

impl GridCell {
    /// Coordinate of the cell.
    #[must_use]
    pub const fn coord(&self) -> CellCoord {
        self.coord
    }

    /// Zero-based column of the cell.
    #[must_use]
    pub const fn x(&self) -> u32 {
        self.coord.column()
    }

    /// Zero-based row of the cell.
    #[must_use]
    pub const fn y(&self) -> u32 {
        self.coord.row()
    }

    /// World position of the cell center.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Reports whether enemies may traverse the cell.
    #[must_use]
    pub const fn walkable(&self) -> bool {
        self.walkable
    }

    /// Reports whether a tower may currently be placed on the cell.
    #[must_use]
    pub const fn buildable(&self) -> bool {
        self.buildable
    }

    /// Reports whether enemies enter the level here.
    #[must_use]
    pub fn is_spawn(&self) -> bool {
        self.marker == CellMarker::Spawn
    }

    /// Reports whether the core sits on this cell.
    #[must_use]
    pub fn is_target(&self) -> bool {
        self.marker == CellMarker::Target
    }

    /// Reports whether the cell is part of the waypoint list.
    #[must_use]
    pub const fn is_waypoint(&self) -> bool {
        self.waypoint
    }

    /// Tower occupying the cell, if any.
    #[must_use]
    pub const fn occupant(&self) -> Option<TowerId> {
        self.occupant
    }
}

/// Arena of grid cells indexed by `(x, y)`.
#[derive(Clone, Debug)]
pub struct GridModel {
    columns: u32,
    rows: u32,
    cell_size: f32,
    origin: Vec3,
    cells: Vec<GridCell>,
}

impl GridModel {
    /// Builds the grid described by a layout. Missing tiles are treated as blocked.
    #[must_use]
    pub fn from_layout(layout: &LevelLayout) -> Self {
        let mut grid = Self {
            columns: layout.columns,
            rows: layout.rows,
            cell_size: layout.cell_size,
            origin: layout.origin,
            cells: Vec::new(),
        };

        let capacity =
            usize::try_from(u64::from(layout.columns) * u64::from(layout.rows)).unwrap_or(0);
        grid.cells.reserve(capacity);
        for row in 0..layout.rows {
            for column in 0..layout.columns {
                let coord = CellCoord::new(column, row);
                let tile = layout.tile(coord).unwrap_or(TileKind::Blocked);
                grid.cells.push(GridCell {
                    coord,
                    position: grid.center_unchecked(coord),
                    walkable: tile.walkable(),
                    buildable: tile.buildable(),
                    marker: tile.marker(),
                    waypoint: layout.waypoints.contains(&coord),
                    occupant: None,
                });
            }
        }

        grid
    }

    /// Number of cell columns.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of cell rows.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Edge length of a cell in world units.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Returns the cell stored at the coordinate.
    #[must_use]
    pub fn cell(&self, coord: CellCoord) -> Option<&GridCell> {
        self.index(coord).and_then(|index| self.cells.get(index))
    }

    /// Iterates every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &GridCell> {
        self.cells.iter()
    }

    /// Resolves the cell containing a world position.
    ///
    /// Positions outside the grid yield `None` rather than the nearest edge
    /// cell so callers can tell the two apart.
    #[must_use]
    pub fn node_at(&self, position: Vec3) -> Option<&GridCell> {
        self.coord_at(position).and_then(|coord| self.cell(coord))
    }

    /// Resolves the coordinate of the cell containing a world position.
    #[must_use]
    pub fn coord_at(&self, position: Vec3) -> Option<CellCoord> {
        if self.columns == 0 || self.rows == 0 || self.cell_size <= 0.0 {
            return None;
        }

        let column = axis_index(position.x, self.origin.x, self.width(), self.columns)?;
        let row = axis_index(position.z, self.origin.z, self.depth(), self.rows)?;
        Some(CellCoord::new(column, row))
    }

    /// World position of a cell center.
    #[must_use]
    pub fn center_of(&self, coord: CellCoord) -> Option<Vec3> {
        self.cell(coord).map(GridCell::position)
    }

    /// Returns the in-bounds neighbours of a cell.
    #[must_use]
    pub fn neighbors(&self, coord: CellCoord, connectivity: Connectivity) -> Vec<&GridCell> {
        if self.index(coord).is_none() {
            return Vec::new();
        }

        let offsets: &[(i32, i32)] = match connectivity {
            Connectivity::Four => &FOUR_OFFSETS,
            Connectivity::Eight => &EIGHT_OFFSETS,
        };

        offsets
            .iter()
            .filter_map(|(columns, rows)| coord.offset(*columns, *rows))
            .filter_map(|neighbor| self.cell(neighbor))
            .collect()
    }

    /// Marks a cell as hosting a tower.
    ///
    /// The change is visible to every subsequent query immediately.
    pub fn set_occupant(&mut self, coord: CellCoord, tower: TowerId) -> Result<(), PlacementError> {
        let index = self.index(coord).ok_or(PlacementError::OutOfBounds)?;
        let cell = &mut self.cells[index];
        if cell.occupant.is_some() {
            return Err(PlacementError::Occupied);
        }
        if !cell.buildable {
            return Err(PlacementError::NotBuildable);
        }

        cell.occupant = Some(tower);
        cell.buildable = false;
        Ok(())
    }

    /// Frees a cell, returning the tower that occupied it.
    pub fn clear_occupant(&mut self, coord: CellCoord) -> Option<TowerId> {
        let index = self.index(coord)?;
        let cell = &mut self.cells[index];
        let previous = cell.occupant.take();
        if previous.is_some() {
            cell.buildable = true;
        }
        previous
    }

    /// Iterates the cells where enemies enter the level.
    pub fn spawn_cells(&self) -> impl Iterator<Item = &GridCell> {
        self.cells.iter().filter(|cell| cell.is_spawn())
    }

    /// Iterates the cells hosting the core.
    pub fn target_cells(&self) -> impl Iterator<Item = &GridCell> {
        self.cells.iter().filter(|cell| cell.is_target())
    }

    fn width(&self) -> f32 {
        self.columns as f32 * self.cell_size
    }

    fn depth(&self) -> f32 {
        self.rows as f32 * self.cell_size
    }

    fn center_unchecked(&self, coord: CellCoord) -> Vec3 {
        Vec3::new(
            self.origin.x - self.width() / 2.0 + (coord.column() as f32 + 0.5) * self.cell_size,
            self.origin.y,
            self.origin.z - self.depth() / 2.0 + (coord.row() as f32 + 0.5) * self.cell_size,
        )
    }

    fn index(&self, coord: CellCoord) -> Option<usize> {
        if coord.column() < self.columns && coord.row() < self.rows {
            let row = usize::try_from(coord.row()).ok()?;
            let column = usize::try_from(coord.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

/// Inverse-lerps a coordinate against the axis extent, then floors and clamps
/// it into the valid index range.
fn axis_index(value: f32, center: f32, extent: f32, count: u32) -> Option<u32> {
    let min = center - extent / 2.0;
    let percent = (value - min) / extent;
    if !(0.0..=1.0).contains(&percent) {
        return None;
    }

    let index = (percent * count as f32).floor() as u32;
    Some(index.min(count - 1))
}
