use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Controls how grids are rendered for humans.
///
/// Grids with more than `threshold` elements are summarised, keeping `edge_items` rows and
/// columns on each side. `precision` fixes the number of decimals of float elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
#[serde(default)]
pub struct DisplayOptions {
    pub threshold: usize,
    pub edge_items: usize,
    pub precision: Option<usize>,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            threshold: 1000,
            edge_items: 3,
            precision: None,
        }
    }
}

const ELLIPSIS: &str = "...";

fn visible(len: usize, edge_items: usize, summarise: bool) -> Vec<Option<usize>> {
    if summarise && len > 2 * edge_items {
        (0..edge_items)
            .map(Some)
            .chain(std::iter::once(None))
            .chain((len - edge_items..len).map(Some))
            .collect()
    } else {
        (0..len).map(Some).collect()
    }
}

/// Row-major rendering: `[[1, 2, 3],\n [4, 5, 6]]`.
pub(crate) fn render_grid<T: Display>(
    height: usize,
    width: usize,
    value: impl Fn(usize, usize) -> T,
    options: &DisplayOptions,
) -> String {
    if height == 0 || width == 0 {
        return "[]".to_string();
    }
    let summarise = height.saturating_mul(width) > options.threshold;
    let rows = visible(height, options.edge_items, summarise);
    let cols = visible(width, options.edge_items, summarise);

    let cells = rows
        .iter()
        .map(|row| {
            row.map(|r| {
                cols.iter()
                    .map(|col| match col {
                        Some(c) => match options.precision {
                            Some(p) => format!("{:.*}", p, value(r, *c)),
                            None => value(r, *c).to_string(),
                        },
                        None => ELLIPSIS.to_string(),
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();

    let pad = cells
        .iter()
        .flatten()
        .flatten()
        .map(|cell| cell.len())
        .max()
        .unwrap_or(0);

    let lines = cells
        .iter()
        .map(|row| match row {
            Some(cells) => {
                let cells = cells
                    .iter()
                    .map(|cell| format!("{:>pad$}", cell, pad = pad))
                    .collect::<Vec<_>>();
                format!("[{}]", cells.join(", "))
            }
            None => ELLIPSIS.to_string(),
        })
        .collect::<Vec<_>>();

    format!("[{}]", lines.join(",\n "))
}
