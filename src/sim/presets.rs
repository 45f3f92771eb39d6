//! Hand-authored terrain chunks
//!
//! Each preset is a character grid, top row first, one character per tile:
//!
//! | char | entity |
//! |------|--------|
//! | `#`  | solid (horizontal runs merge into one rectangle) |
//! | `%`  | crumbling solid, one per tile |
//! | `=`  | one-way platform (runs merge) |
//! | `^` `<` `>` | spring launching up / left / right |
//! | `*`  | crystal |
//! | `o`  | berry |
//! | `.`  | empty |
//!
//! The bottom row is the entry and must hold a foothold. The generator places
//! the bottom row's top edge at the next gap above the cursor.

use super::geom::Rect;
use super::state::SpringDir;
use crate::consts::*;

/// A named chunk layout
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub name: &'static str,
    pub rows: &'static [&'static str],
}

pub const PRESETS: &[Preset] = &[
    Preset {
        name: "staircase",
        rows: &[
            "......##",
            "...o....",
            "........",
            "...##...",
            "........",
            "........",
            "##......",
        ],
    },
    Preset {
        name: "chimney",
        rows: &[
            "#....#",
            "#....#",
            "#....#",
            "#....#",
            "#....#",
            "#====#",
        ],
    },
    Preset {
        name: "overhang",
        rows: &[
            "..######",
            "........",
            "....o...",
            "##......",
        ],
    },
    Preset {
        name: "pyramid",
        rows: &[
            "...^....",
            "..###...",
            ".#####..",
        ],
    },
    Preset {
        name: "crumble_zigzag",
        rows: &[
            "%%%.....",
            "........",
            "........",
            "....%%%.",
            "........",
            "........",
            "=====...",
        ],
    },
    Preset {
        name: "spring_tower",
        rows: &[
            "....====",
            "#>......",
            "#.......",
            "###.....",
        ],
    },
    Preset {
        name: "crystal_gap",
        rows: &[
            "......##",
            "........",
            "........",
            "...*....",
            "........",
            "........",
            "##......",
        ],
    },
];

/// Entities of a parsed preset in local pixel coordinates (origin at the grid's top-left)
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub solids: Vec<Rect>,
    pub crumbling: Vec<Rect>,
    pub platforms: Vec<Rect>,
    pub springs: Vec<(Rect, SpringDir)>,
    pub crystals: Vec<Rect>,
    pub berries: Vec<Rect>,
    pub cols: usize,
    pub rows: usize,
    /// Row index of the topmost foothold
    pub top_row: usize,
    /// Horizontal centre of the topmost foothold row
    pub top_center_x: f32,
    /// Horizontal centre of the entry (bottom) row's footholds
    pub entry_center_x: f32,
}

impl Chunk {
    pub fn width(&self) -> f32 {
        self.cols as f32 * TILE_SIZE
    }

    pub fn height(&self) -> f32 {
        self.rows as f32 * TILE_SIZE
    }

    /// Whether it carries an upward spring at or above its top foothold
    pub fn exits_by_spring(&self) -> bool {
        let top = self.top_row as f32 * TILE_SIZE;
        self.springs
            .iter()
            .any(|(r, d)| *d == SpringDir::Up && r.y < top)
    }
}

fn is_foothold(c: u8) -> bool {
    matches!(c, b'#' | b'%' | b'=')
}

/// Horizontal mirror of one row (springs swap their direction)
fn mirror_row(row: &str) -> Vec<u8> {
    row.bytes()
        .rev()
        .map(|c| match c {
            b'<' => b'>',
            b'>' => b'<',
            other => other,
        })
        .collect()
}

/// Centre of the foothold tiles in a row
fn foothold_center(row: &[u8]) -> Option<f32> {
    let first = row.iter().position(|&c| is_foothold(c))?;
    let last = row.iter().rposition(|&c| is_foothold(c))?;
    Some((first + last + 1) as f32 * TILE_SIZE / 2.0)
}

/// Parse a preset grid into local rectangles
pub fn parse(preset: &Preset, mirrored: bool) -> Chunk {
    let grid: Vec<Vec<u8>> = preset
        .rows
        .iter()
        .map(|row| {
            if mirrored {
                mirror_row(row)
            } else {
                row.bytes().collect()
            }
        })
        .collect();

    let mut chunk = Chunk {
        rows: grid.len(),
        cols: grid.iter().map(Vec::len).max().unwrap_or(0),
        ..Chunk::default()
    };

    for (r, row) in grid.iter().enumerate() {
        let y = r as f32 * TILE_SIZE;
        let mut c = 0;
        while c < row.len() {
            let x = c as f32 * TILE_SIZE;
            match row[c] {
                run @ (b'#' | b'=') => {
                    let len = row[c..].iter().take_while(|&&ch| ch == run).count();
                    let w = len as f32 * TILE_SIZE;
                    if run == b'#' {
                        chunk.solids.push(Rect::new(x, y, w, TILE_SIZE));
                    } else {
                        chunk.platforms.push(Rect::new(x, y, w, PLATFORM_THICKNESS));
                    }
                    c += len;
                    continue;
                }
                b'%' => chunk.crumbling.push(Rect::new(x, y, TILE_SIZE, TILE_SIZE)),
                b'^' => chunk
                    .springs
                    .push((Rect::new(x, y, TILE_SIZE, TILE_SIZE), SpringDir::Up)),
                b'<' => chunk
                    .springs
                    .push((Rect::new(x, y, TILE_SIZE, TILE_SIZE), SpringDir::Left)),
                b'>' => chunk
                    .springs
                    .push((Rect::new(x, y, TILE_SIZE, TILE_SIZE), SpringDir::Right)),
                b'*' => {
                    let inset = (TILE_SIZE - CRYSTAL_SIZE) / 2.0;
                    chunk
                        .crystals
                        .push(Rect::new(x + inset, y + inset, CRYSTAL_SIZE, CRYSTAL_SIZE));
                }
                b'o' => {
                    let inset = (TILE_SIZE - BERRY_SIZE) / 2.0;
                    chunk
                        .berries
                        .push(Rect::new(x + inset, y + inset, BERRY_SIZE, BERRY_SIZE));
                }
                _ => {}
            }
            c += 1;
        }
    }

    chunk.top_row = grid
        .iter()
        .position(|row| row.iter().any(|&c| is_foothold(c)))
        .unwrap_or(0);
    chunk.top_center_x = grid
        .get(chunk.top_row)
        .and_then(|row| foothold_center(row))
        .unwrap_or(chunk.width() / 2.0);
    chunk.entry_center_x = grid
        .last()
        .and_then(|row| foothold_center(row))
        .unwrap_or(chunk.width() / 2.0);

    chunk
}
