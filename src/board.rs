//! Board engine: stone placement, liberty search, capture, and suicide rejection.
//!
//! The board knows nothing about turns or sessions. Coordinates are
//! `(row, col)` with `(0, 0)` in the top-left corner. Placement takes signed
//! coordinates so that any integers a client sends can be bounds-checked here
//! instead of by the caller.

use std::fmt;

use crate::constants::{DIAGONAL, ORTHOGONAL};
use crate::error::{GameError, Payload};
use crate::protocol::BoardMsg;

/// Session participant, and owner of a stone.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Player {
    One,
    Two,
}

impl Player {
    pub const ALL: [Player; 2] = [Player::One, Player::Two];

    /// Wire identity (1 or 2).
    pub fn id(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Player::One),
            2 => Some(Player::Two),
            _ => None,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Zero-based index for per-player tables.
    pub fn index(self) -> usize {
        self.id() as usize - 1
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Why a placement was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    /// Point is outside the grid or not empty
    OutOfBoundsOrOccupied,
    /// Placed group would have no liberties and nothing was captured
    Suicide,
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveError::OutOfBoundsOrOccupied => write!(f, "point occupied or out of bounds"),
            MoveError::Suicide => write!(f, "suicide"),
        }
    }
}

impl std::error::Error for MoveError {}

/// Detached copy of every cell on a board, row-major.
///
/// Copies never alias the board they were taken from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    size: usize,
    cells: Vec<Option<Player>>,
}

impl Grid {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Player> {
        cell_index(self.size, row, col).and_then(|idx| self.cells[idx])
    }

    /// Out-of-bounds points are ignored.
    pub fn set(&mut self, row: usize, col: usize, cell: Option<Player>) {
        if let Some(idx) = cell_index(self.size, row, col) {
            self.cells[idx] = cell;
        }
    }
}

/// Row-major index of `(row, col)` on a `size`x`size` grid.
fn cell_index(size: usize, row: usize, col: usize) -> Option<usize> {
    (row < size && col < size).then_some(row * size + col)
}

/// Cell-by-cell comparison. Grids of different sizes are never equal.
pub fn grids_equal(a: &Grid, b: &Grid) -> bool {
    a.size == b.size && a.cells == b.cells
}

/// Square Go board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    size: usize,
    cells: Vec<Option<Player>>,
}

impl Board {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![None; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn index(&self, row: i64, col: i64) -> Option<usize> {
        if row < 0 || col < 0 {
            return None;
        }
        cell_index(self.size, row as usize, col as usize)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Player> {
        cell_index(self.size, row, col).and_then(|idx| self.cells[idx])
    }

    /// True only for in-bounds empty points.
    pub fn is_empty(&self, row: i64, col: i64) -> bool {
        self.index(row, col)
            .is_some_and(|idx| self.cells[idx].is_none())
    }

    /// Writes a cell directly, bypassing capture rules. Out-of-bounds points are ignored.
    pub fn set(&mut self, row: usize, col: usize, cell: Option<Player>) {
        if let Some(idx) = cell_index(self.size, row, col) {
            self.cells[idx] = cell;
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(None);
    }

    pub fn stone_count(&self, player: Player) -> usize {
        self.cells.iter().filter(|c| **c == Some(player)).count()
    }

    /// Empty points in row-major order.
    pub fn empty_points(&self) -> Vec<(usize, usize)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_none())
            .map(|(i, _)| (i / self.size, i % self.size))
            .collect()
    }

    fn neighbors(&self, idx: usize) -> Vec<usize> {
        let (row, col) = ((idx / self.size) as i64, (idx % self.size) as i64);
        ORTHOGONAL
            .iter()
            .filter_map(|&(dr, dc)| self.index(row + dr, col + dc))
            .collect()
    }

    /// Place a stone for `player` and resolve captures.
    ///
    /// Returns the number of opponent stones removed. On error the board is
    /// left exactly as it was.
    pub fn play(&mut self, row: i64, col: i64, player: Player) -> Result<usize, MoveError> {
        let Some(idx) = self.index(row, col) else {
            return Err(MoveError::OutOfBoundsOrOccupied);
        };
        if self.cells[idx].is_some() {
            return Err(MoveError::OutOfBoundsOrOccupied);
        }
        self.cells[idx] = Some(player);

        let opponent = player.opponent();
        let mut visited = vec![false; self.cells.len()];
        let mut captured = 0;
        for n in self.neighbors(idx) {
            // An earlier neighbor may already have taken this group off the board.
            if self.cells[n] != Some(opponent) {
                continue;
            }
            visited.fill(false);
            if !self.has_liberty(n, &mut visited) {
                visited.fill(false);
                captured += self.remove_group(n, &mut visited);
            }
        }

        visited.fill(false);
        if captured == 0 && !self.has_liberty(idx, &mut visited) {
            self.cells[idx] = None;
            return Err(MoveError::Suicide);
        }
        Ok(captured)
    }

    /// Walk the group containing `start` and stop at the first empty neighbor.
    ///
    /// `visited` must be all-false on entry and as long as the board.
    fn has_liberty(&self, start: usize, visited: &mut [bool]) -> bool {
        let Some(owner) = self.cells[start] else {
            return true;
        };
        let mut stack = vec![start];
        visited[start] = true;
        while let Some(pt) = stack.pop() {
            for n in self.neighbors(pt) {
                match self.cells[n] {
                    None => return true,
                    Some(c) if c == owner && !visited[n] => {
                        visited[n] = true;
                        stack.push(n);
                    }
                    _ => {}
                }
            }
        }
        false
    }

    /// Clear the whole group containing `start`, returning how many stones went.
    fn remove_group(&mut self, start: usize, visited: &mut [bool]) -> usize {
        let Some(owner) = self.cells[start] else {
            return 0;
        };
        let mut stack = vec![start];
        let mut group = Vec::new();
        visited[start] = true;
        while let Some(pt) = stack.pop() {
            group.push(pt);
            for n in self.neighbors(pt) {
                if !visited[n] && self.cells[n] == Some(owner) {
                    visited[n] = true;
                    stack.push(n);
                }
            }
        }
        for &pt in &group {
            self.cells[pt] = None;
        }
        group.len()
    }

    pub fn grid_copy(&self) -> Grid {
        Grid {
            size: self.size,
            cells: self.cells.clone(),
        }
    }

    /// Restore every cell from `grid`. A grid of another size is ignored.
    pub fn set_grid(&mut self, grid: &Grid) {
        if grid.size == self.size {
            self.cells.copy_from_slice(&grid.cells);
        }
    }

    /// Owner of the eye at an empty point, if it is one.
    ///
    /// All orthogonal neighbors must belong to one player, and opposing
    /// stones may sit on at most one diagonal in the centre and none on the edge.
    pub fn eye_owner(&self, row: usize, col: usize) -> Option<Player> {
        let idx = self.index(row as i64, col as i64)?;
        if self.cells[idx].is_some() {
            return None;
        }

        let mut owner = None;
        for n in self.neighbors(idx) {
            let stone = self.cells[n]?;
            match owner {
                None => owner = Some(stone),
                Some(o) if o != stone => return None,
                _ => {}
            }
        }
        let owner = owner?;

        let mut at_edge = false;
        let mut false_count = 0;
        for (dr, dc) in DIAGONAL {
            match self.index(row as i64 + dr, col as i64 + dc) {
                None => at_edge = true,
                Some(d) if self.cells[d] == Some(owner.opponent()) => false_count += 1,
                Some(_) => {}
            }
        }
        let tolerance = if at_edge { 0 } else { 1 };
        (false_count <= tolerance).then_some(owner)
    }

    pub fn to_msg(&self) -> BoardMsg {
        BoardMsg {
            size: self.size,
            grid: self
                .cells
                .chunks(self.size.max(1))
                .map(|row| row.iter().map(|c| c.map_or(0, Player::id)).collect())
                .collect(),
        }
    }

    /// Rebuild a board from its wire form, rejecting any shape mismatch.
    pub fn from_msg(msg: &BoardMsg) -> Result<Self, GameError> {
        if msg.grid.len() != msg.size {
            return Err(GameError::malformed(Payload::Board, format!(
                "expected {} rows, got {}",
                msg.size,
                msg.grid.len()
            )));
        }
        let mut board = Board::new(msg.size);
        for (r, row) in msg.grid.iter().enumerate() {
            if row.len() != msg.size {
                return Err(GameError::malformed(Payload::Board, format!(
                    "row {r} has {} cells, expected {}",
                    row.len(),
                    msg.size
                )));
            }
            for (c, &v) in row.iter().enumerate() {
                let cell = match v {
                    0 => None,
                    id => Some(Player::from_id(id).ok_or_else(|| {
                        GameError::malformed(Payload::Board, format!("bad cell value {id} at ({r},{c})"))
                    })?),
                };
                board.set(r, c, cell);
            }
        }
        Ok(board)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "    ")?;
        for c in 0..self.size {
            write!(f, "{c:2}")?;
        }
        writeln!(f)?;
        for r in 0..self.size {
            write!(f, "{r:2}: ")?;
            for c in 0..self.size {
                let ch = match self.get(r, c) {
                    Some(Player::One) => 'X',
                    Some(Player::Two) => 'O',
                    None => '.',
                };
                write!(f, " {ch}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with(size: usize, ones: &[(usize, usize)], twos: &[(usize, usize)]) -> Board {
        let mut b = Board::new(size);
        for &(r, c) in ones {
            b.set(r, c, Some(Player::One));
        }
        for &(r, c) in twos {
            b.set(r, c, Some(Player::Two));
        }
        b
    }

    #[test]
    fn test_play_single_stone() {
        let mut b = Board::new(5);
        assert_eq!(b.play(2, 2, Player::One), Ok(0));
        assert_eq!(b.get(2, 2), Some(Player::One));
    }

    #[test]
    fn test_occupied_and_out_of_bounds_leave_board_unchanged() {
        let mut b = board_with(3, &[(1, 1)], &[(0, 0)]);
        let before = b.clone();
        for (r, c) in [(1, 1), (0, 0), (-1, 0), (0, -1), (3, 0), (0, 3), (i64::MAX, 0)] {
            assert_eq!(
                b.play(r, c, Player::Two),
                Err(MoveError::OutOfBoundsOrOccupied),
                "({r},{c})"
            );
            assert_eq!(b, before);
        }
    }

    #[test]
    fn test_capture_single_stone() {
        let mut b = board_with(3, &[(0, 1), (1, 0), (1, 2)], &[(1, 1)]);
        assert_eq!(b.play(2, 1, Player::One), Ok(1));
        assert_eq!(b.get(1, 1), None);
        assert_eq!(b.get(2, 1), Some(Player::One));
    }

    #[test]
    fn test_capture_group() {
        // Two white stones on the top edge, black closes the last liberty.
        let mut b = board_with(4, &[(0, 0), (1, 1), (1, 2)], &[(0, 1), (0, 2)]);
        assert_eq!(b.play(0, 3, Player::One), Ok(2));
        assert_eq!(b.stone_count(Player::Two), 0);
    }

    #[test]
    fn test_capture_two_groups_at_once() {
        // Playing (0,1) removes white at (0,0) and white at (0,2).
        let mut b = board_with(3, &[(1, 0), (1, 2)], &[(0, 0), (0, 2)]);
        assert_eq!(b.play(0, 1, Player::One), Ok(2));
        assert_eq!(b.get(0, 0), None);
        assert_eq!(b.get(0, 2), None);
    }

    #[test]
    fn test_suicide_is_rejected_and_reverted() {
        let mut b = board_with(3, &[], &[(0, 1), (1, 0), (1, 2), (2, 1)]);
        let before = b.clone();
        assert_eq!(b.play(1, 1, Player::One), Err(MoveError::Suicide));
        assert_eq!(b, before);
    }

    #[test]
    fn test_corner_suicide() {
        let mut b = board_with(5, &[(0, 1), (1, 0)], &[]);
        assert_eq!(b.play(0, 0, Player::Two), Err(MoveError::Suicide));
        assert_eq!(b.get(0, 0), None);
    }

    #[test]
    fn test_suicide_allowed_when_it_captures() {
        // White at (0,0) has one liberty left at (0,1); black filling it has no
        // liberties of its own until the capture frees (0,0).
        let mut b = board_with(3, &[(1, 0)], &[(0, 0), (0, 2), (1, 1)]);
        assert_eq!(b.play(0, 1, Player::One), Ok(1));
        assert_eq!(b.get(0, 0), None);
        assert_eq!(b.get(0, 1), Some(Player::One));
    }

    #[test]
    fn test_filling_own_group_last_liberty_is_suicide() {
        let mut b = board_with(3, &[(0, 0)], &[(0, 2), (1, 0), (1, 1)]);
        assert_eq!(b.play(0, 1, Player::One), Err(MoveError::Suicide));
        assert_eq!(b.get(0, 0), Some(Player::One));
        assert_eq!(b.get(0, 1), None);
    }

    #[test]
    fn test_grid_copy_roundtrip() {
        let b = board_with(4, &[(0, 0)], &[(3, 3)]);
        let copy = b.grid_copy();
        assert!(grids_equal(&copy, &b.grid_copy()));

        let mut altered = copy.clone();
        altered.set(0, 0, None);
        assert_eq!(b.get(0, 0), Some(Player::One));
        assert!(!grids_equal(&altered, &copy));

        let mut restored = b.clone();
        restored.set_grid(&altered);
        assert_eq!(restored.get(0, 0), None);
        assert_eq!(restored.get(3, 3), Some(Player::Two));
    }

    #[test]
    fn test_grids_of_different_size_differ() {
        assert!(!grids_equal(
            &Board::new(3).grid_copy(),
            &Board::new(4).grid_copy()
        ));
    }

    #[test]
    fn test_set_grid_ignores_other_size() {
        let mut b = board_with(3, &[(1, 1)], &[]);
        b.set_grid(&Board::new(5).grid_copy());
        assert_eq!(b.get(1, 1), Some(Player::One));
    }

    #[test]
    fn test_is_empty_and_bounds() {
        let mut b = Board::new(3);
        assert!(!b.is_empty(-1, 0));
        assert!(!b.is_empty(0, -1));
        assert!(!b.is_empty(3, 0));
        assert!(b.is_empty(0, 0));
        b.set(0, 0, Some(Player::One));
        assert!(!b.is_empty(0, 0));
    }

    #[test]
    fn test_out_of_bounds_get_and_set() {
        let mut b = Board::new(3);
        b.set(3, 0, Some(Player::One));
        b.set(0, 3, Some(Player::One));
        assert_eq!(b.stone_count(Player::One), 0);
        assert_eq!(b.get(0, 3), None);

        let mut grid = b.grid_copy();
        grid.set(2, 3, Some(Player::Two));
        assert_eq!(grid.get(2, 3), None);
        assert!(grids_equal(&grid, &b.grid_copy()));
        grid.set(2, 2, Some(Player::Two));
        assert_eq!(grid.get(2, 2), Some(Player::Two));
    }

    #[test]
    fn test_eye_owner() {
        // Black eye in the corner at (0,0).
        let b = board_with(5, &[(0, 1), (1, 0), (1, 1)], &[]);
        assert_eq!(b.eye_owner(0, 0), Some(Player::One));

        // A white stone on the only diagonal makes the corner eye false.
        let b = board_with(5, &[(0, 1), (1, 0)], &[(1, 1)]);
        assert_eq!(b.eye_owner(0, 0), None);

        // Empty neighbor: not an eye.
        assert_eq!(Board::new(5).eye_owner(2, 2), None);

        // Centre eye tolerates one opposing diagonal.
        let b = board_with(5, &[(1, 2), (2, 1), (2, 3), (3, 2)], &[(1, 1)]);
        assert_eq!(b.eye_owner(2, 2), Some(Player::One));
    }

    #[test]
    fn test_msg_roundtrip() {
        let b = board_with(3, &[(0, 0)], &[(1, 2)]);
        let msg = b.to_msg();
        assert_eq!(msg.grid, vec![vec![1, 0, 0], vec![0, 0, 2], vec![0, 0, 0]]);
        assert_eq!(Board::from_msg(&msg), Ok(b));
    }

    #[test]
    fn test_from_msg_rejects_bad_shape() {
        let msg = BoardMsg {
            size: 2,
            grid: vec![vec![0, 0]],
        };
        assert!(Board::from_msg(&msg).is_err());

        let msg = BoardMsg {
            size: 2,
            grid: vec![vec![0, 0], vec![0, 3]],
        };
        assert!(Board::from_msg(&msg).is_err());
    }

    #[test]
    fn test_display() {
        let b = board_with(2, &[(0, 0)], &[(1, 1)]);
        assert_eq!(b.to_string(), "     0 1\n 0:  X .\n 1:  . O\n");
    }
}
