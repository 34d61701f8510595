//! Iteration over multi-level tile grids.
//!
//! A pyramid is a chain of [`TileLevel`]s from the coarsest to the finest.
//! [`GridTileIterator`] walks each level row by row (x varies fastest), skips
//! empty cells and then falls through to the next finer level.

use std::fmt;

use log::warn;

use crate::envelope::Envelope;
use crate::errors::{TreeError, TreeResult};

/// One level of a tile pyramid.
pub trait TileLevel {
    type Tile;

    fn num_x_tiles(&self) -> usize;

    fn num_y_tiles(&self) -> usize;

    /// The tile at `(x, y)`, `None` for an empty cell. An error marks the
    /// tile as unreadable.
    fn tile(&self, x: usize, y: usize) -> TreeResult<Option<Self::Tile>>;

    /// The next level down, if any.
    fn finer_level(&self) -> Option<&Self>;
}

/// Where a tile sits in the pyramid. `depth` is 0 for the level the
/// iteration started at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TilePosition {
    pub depth: usize,
    pub x: usize,
    pub y: usize,
}

impl fmt::Display for TilePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile ({}, {}) at depth {}", self.x, self.y, self.depth)
    }
}

type UnreadableTileHook<'a> = Box<dyn FnMut(TilePosition, &TreeError) + 'a>;

/// Row-major iterator over every non-empty tile of a pyramid, coarsest level
/// first.
///
/// Unreadable tiles are passed to the `on_unreadable` hook (by default a
/// `warn!` log line) and skipped, so the iteration may yield fewer tiles
/// than the pyramid holds.
pub struct GridTileIterator<'a, L: TileLevel> {
    root: &'a L,
    level: Option<&'a L>,
    depth: usize,
    x: usize,
    y: usize,
    skipped: usize,
    on_unreadable: UnreadableTileHook<'a>,
}

impl<'a, L: TileLevel> GridTileIterator<'a, L> {
    pub fn new(root: &'a L) -> Self {
        Self {
            root,
            level: Some(root),
            depth: 0,
            x: 0,
            y: 0,
            skipped: 0,
            on_unreadable: Box::new(|position, err| {
                warn!("Skipping unreadable {}: {}", position, err)
            }),
        }
    }

    pub fn on_unreadable<F>(mut self, hook: F) -> Self
    where
        F: FnMut(TilePosition, &TreeError) + 'a,
    {
        self.on_unreadable = Box::new(hook);
        self
    }

    /// Tiles skipped so far because they could not be read.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Position of the next cell to be examined, `None` once exhausted.
    pub fn position(&self) -> Option<TilePosition> {
        self.level.map(|_| TilePosition {
            depth: self.depth,
            x: self.x,
            y: self.y,
        })
    }

    /// Restarts from the first cell of the root level.
    pub fn rewind(&mut self) {
        self.level = Some(self.root);
        self.depth = 0;
        self.x = 0;
        self.y = 0;
        self.skipped = 0;
    }
}

impl<L: TileLevel> Iterator for GridTileIterator<'_, L> {
    type Item = L::Tile;

    fn next(&mut self) -> Option<L::Tile> {
        while let Some(level) = self.level {
            while self.y < level.num_y_tiles() {
                while self.x < level.num_x_tiles() {
                    let position = TilePosition {
                        depth: self.depth,
                        x: self.x,
                        y: self.y,
                    };
                    self.x += 1;
                    match level.tile(position.x, position.y) {
                        Ok(Some(tile)) => return Some(tile),
                        Ok(None) => {}
                        Err(err) => {
                            self.skipped += 1;
                            (self.on_unreadable)(position, &err);
                        }
                    }
                }
                self.x = 0;
                self.y += 1;
            }
            self.y = 0;
            self.depth += 1;
            self.level = level.finer_level();
        }
        None
    }
}

impl<L: TileLevel> fmt::Debug for GridTileIterator<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridTileIterator")
            .field("position", &self.position())
            .field("skipped", &self.skipped)
            .finish()
    }
}

/// An in-memory pyramid level: a dense grid of optional tiles over a region,
/// optionally backed by a finer level.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid<T> {
    bounds: Envelope,
    x_tiles: usize,
    y_tiles: usize,
    cells: Vec<Option<T>>,
    finer: Option<Box<TileGrid<T>>>,
}

impl<T: Clone> TileGrid<T> {
    /// An empty grid of `x_tiles` by `y_tiles` cells covering the 2D `bounds`.
    pub fn new(bounds: Envelope, x_tiles: usize, y_tiles: usize) -> TreeResult<Self> {
        if bounds.dimension() != 2 {
            return Err(TreeError::invalid(format!(
                "tile grids are two-dimensional, got {} dimensions",
                bounds.dimension()
            )));
        }
        Ok(Self {
            bounds,
            x_tiles,
            y_tiles,
            cells: vec![None; x_tiles * y_tiles],
            finer: None,
        })
    }

    pub fn with_finer(mut self, finer: TileGrid<T>) -> Self {
        self.finer = Some(Box::new(finer));
        self
    }

    /// Puts `tile` in cell `(x, y)`, returning the previous occupant.
    pub fn set(&mut self, x: usize, y: usize, tile: T) -> TreeResult<Option<T>> {
        let index = self.index(x, y)?;
        Ok(self.cells[index].replace(tile))
    }

    pub fn remove(&mut self, x: usize, y: usize) -> TreeResult<Option<T>> {
        let index = self.index(x, y)?;
        Ok(self.cells[index].take())
    }

    /// Region covered by cell `(x, y)`. Row 0 is at the lower y bound.
    pub fn cell_envelope(&self, x: usize, y: usize) -> TreeResult<Envelope> {
        self.index(x, y)?;
        let width = self.bounds.extent(0) / self.x_tiles as f64;
        let height = self.bounds.extent(1) / self.y_tiles as f64;
        let min_x = self.bounds.lower()[0] + width * x as f64;
        let min_y = self.bounds.lower()[1] + height * y as f64;
        Envelope::rect(min_x, min_y, min_x + width, min_y + height)
    }

    pub fn bounds(&self) -> &Envelope {
        &self.bounds
    }

    fn index(&self, x: usize, y: usize) -> TreeResult<usize> {
        if x >= self.x_tiles || y >= self.y_tiles {
            return Err(TreeError::invalid(format!(
                "cell ({}, {}) outside a {}x{} grid",
                x, y, self.x_tiles, self.y_tiles
            )));
        }
        Ok(y * self.x_tiles + x)
    }
}

impl<T: Clone> TileLevel for TileGrid<T> {
    type Tile = T;

    fn num_x_tiles(&self) -> usize {
        self.x_tiles
    }

    fn num_y_tiles(&self) -> usize {
        self.y_tiles
    }

    fn tile(&self, x: usize, y: usize) -> TreeResult<Option<T>> {
        let index = self.index(x, y)?;
        Ok(self.cells[index].clone())
    }

    fn finer_level(&self) -> Option<&Self> {
        self.finer.as_deref()
    }
}
