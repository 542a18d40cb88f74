//! Row generation for CSV export across several streams.

use std::iter::Peekable;

use crate::store::{Snapshot, WindowIter, Windowing, aggregate};

/// What each exported column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvQuery {
    Raw,
    AlignedWindows { point_width: u32 },
    Windows { width: u64 },
}

/// One exported stream: its column label and the snapshot it reads.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub label: String,
    pub snapshot: Snapshot,
}

/// A validated export over `[start, end)`.
#[derive(Debug, Clone)]
pub struct CsvPlan {
    pub query: CsvQuery,
    pub start: i64,
    pub end: i64,
    pub sources: Vec<CsvSource>,
}

const STAT_SUFFIXES: [&str; 4] = ["min", "mean", "max", "count"];

type Cells = Vec<String>;
type Column<'a> = Peekable<Box<dyn Iterator<Item = (i64, Cells)> + Send + 'a>>;

impl CsvPlan {
    fn cells_per_source(&self) -> usize {
        match self.query {
            CsvQuery::Raw => 1,
            _ => STAT_SUFFIXES.len(),
        }
    }

    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["timestamp".to_string()];
        for source in &self.sources {
            match self.query {
                CsvQuery::Raw => header.push(source.label.clone()),
                _ => header.extend(
                    STAT_SUFFIXES
                        .iter()
                        .map(|suffix| format!("{}_{suffix}", source.label)),
                ),
            }
        }
        header
    }

    /// Second header row with the resolved version of every column.
    pub fn version_header(&self) -> Vec<String> {
        let mut header = vec!["version".to_string()];
        for source in &self.sources {
            let version = source.snapshot.version.to_string();
            header.extend(std::iter::repeat_n(version, self.cells_per_source()));
        }
        header
    }

    fn span(&self) -> (i64, i64) {
        match self.query {
            CsvQuery::Raw => (self.start, self.end),
            CsvQuery::AlignedWindows { point_width } => {
                aggregate::aligned_span(self.start, self.end, point_width)
            }
            CsvQuery::Windows { width } => aggregate::fixed_span(self.start, self.end, width),
        }
    }

    fn column<'a>(&self, snapshot: &'a Snapshot) -> Column<'a> {
        let (start, end) = self.span();
        let range = snapshot.points.range(start..end.max(start));
        let iter: Box<dyn Iterator<Item = (i64, Cells)> + Send + 'a> = match self.query {
            CsvQuery::Raw => Box::new(range.map(|(t, v)| (*t, vec![v.to_string()]))),
            CsvQuery::AlignedWindows { point_width } => Box::new(
                WindowIter::new(range, Windowing::Aligned { point_width }).map(stat_cells),
            ),
            CsvQuery::Windows { width } => Box::new(
                WindowIter::new(range, Windowing::Fixed { origin: self.start, width })
                    .map(stat_cells),
            ),
        };
        iter.peekable()
    }

    /// Data rows merged by timestamp; a stream without a value at a timestamp leaves its cells
    /// empty.
    pub fn rows(&self) -> impl Iterator<Item = Vec<String>> + Send + '_ {
        let width = self.cells_per_source();
        let mut columns: Vec<Column<'_>> = self
            .sources
            .iter()
            .map(|source| self.column(&source.snapshot))
            .collect();

        std::iter::from_fn(move || {
            let time = columns
                .iter_mut()
                .filter_map(|column| column.peek().map(|(t, _)| *t))
                .min()?;

            let mut row = vec![time.to_string()];
            for column in &mut columns {
                match column.next_if(|(t, _)| *t == time) {
                    Some((_, cells)) => row.extend(cells),
                    None => row.extend(std::iter::repeat_n(String::new(), width)),
                }
            }
            Some(row)
        })
    }
}

fn stat_cells(stat: crate::types::StatPoint) -> (i64, Cells) {
    (
        stat.time,
        vec![
            stat.min.to_string(),
            stat.mean.to_string(),
            stat.max.to_string(),
            stat.count.to_string(),
        ],
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::series::Points;

    fn source(label: &str, version: u64, points: &[(i64, f64)]) -> CsvSource {
        CsvSource {
            label: label.to_string(),
            snapshot: Snapshot {
                version,
                points: Arc::new(points.iter().copied().collect::<Points>()),
            },
        }
    }

    #[test]
    fn test_raw_rows_merge_by_time() {
        let plan = CsvPlan {
            query: CsvQuery::Raw,
            start: 0,
            end: 100,
            sources: vec![
                source("a", 11, &[(1, 1.5), (3, 3.0)]),
                source("b", 12, &[(2, 2.0), (3, 30.0), (100, 9.0)]),
            ],
        };

        assert_eq!(plan.header(), ["timestamp", "a", "b"]);
        assert_eq!(plan.version_header(), ["version", "11", "12"]);
        let rows: Vec<_> = plan.rows().collect();
        assert_eq!(
            rows,
            [
                vec!["1", "1.5", ""],
                vec!["2", "", "2"],
                vec!["3", "3", "30"],
            ]
        );
    }

    #[test]
    fn test_window_rows_have_stat_columns() {
        let plan = CsvPlan {
            query: CsvQuery::Windows { width: 10 },
            start: 0,
            end: 20,
            sources: vec![source("s", 11, &[(0, 1.0), (5, 3.0), (15, 7.0)])],
        };

        assert_eq!(plan.header(), ["timestamp", "s_min", "s_mean", "s_max", "s_count"]);
        let rows: Vec<_> = plan.rows().collect();
        assert_eq!(rows, [vec!["0", "1", "2", "3", "2"], vec!["10", "7", "7", "7", "1"]]);
    }
}
