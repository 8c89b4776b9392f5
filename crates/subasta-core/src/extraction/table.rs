use crate::extraction::RawTable;

/// Reconstruct lot tables from positioned text.
///
/// Both backends reduce a page to rows of positioned tokens: pdftotext word
/// boxes (x in points) or whitespace-separated runs of layout text (x in
/// character columns). A header row fixes the columns and every following
/// token is assigned to the column it overlaps most.
#[derive(Debug, Clone, PartialEq)]
pub struct Positioned {
    pub text: String,
    pub x_min: f32,
    pub x_max: f32,
}

impl Positioned {
    fn center(&self) -> f32 {
        (self.x_min + self.x_max) / 2.0
    }

    fn overlap(&self, other: &Positioned) -> f32 {
        (self.x_max.min(other.x_max) - self.x_min.max(other.x_min)).max(0.0)
    }
}

const HEADER_KEYWORDS: [&str; 9] = [
    "lote",
    "sexo",
    "can",
    "total",
    "prom",
    "procedencia",
    "entrada",
    "base",
    "final",
];

/// Detect if a row looks like the lot table header.
pub fn is_table_header(tokens: &[Positioned]) -> bool {
    let words: Vec<String> = tokens
        .iter()
        .flat_map(|t| t.text.split_whitespace())
        .map(|w| {
            w.to_lowercase()
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_string()
        })
        .collect();
    let count = HEADER_KEYWORDS
        .iter()
        .filter(|kw| words.iter().any(|w| w == *kw))
        .count();
    count >= 3
}

/// Split a layout line into runs separated by 2+ whitespace characters,
/// keeping character positions.
pub fn layout_tokens(line: &str) -> Vec<Positioned> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut space_count = 0;

    for (col, c) in line.chars().enumerate() {
        if c.is_whitespace() {
            space_count += 1;
            if space_count == 2 {
                if let Some(s) = start.take() {
                    tokens.push(token_from(line, s, end));
                }
            }
        } else {
            if start.is_none() {
                start = Some(col);
            }
            space_count = 0;
            end = col + 1;
        }
    }

    if let Some(s) = start {
        tokens.push(token_from(line, s, end));
    }

    tokens
}

fn token_from(line: &str, start: usize, end: usize) -> Positioned {
    let text: String = line.chars().skip(start).take(end - start).collect();
    Positioned {
        text: text.trim().to_string(),
        x_min: start as f32,
        x_max: end as f32,
    }
}

/// Cut a page's rows into tables, one per header row.
///
/// `columns` are explicit right edges of every column but the last; without
/// them the header tokens define the columns.
pub fn build_tables(
    page_number: usize,
    rows: Vec<Vec<Positioned>>,
    columns: Option<&[f32]>,
) -> Vec<RawTable> {
    let mut tables = Vec::new();
    let mut current: Option<(Vec<Positioned>, RawTable)> = None;

    for row in rows {
        if row.is_empty() {
            continue;
        }

        if is_table_header(&row) {
            if let Some((_, table)) = current.take() {
                tables.push(table);
            }
            let (spans, header) = match columns {
                Some(bounds) if !bounds.is_empty() => {
                    let header = assign_by_bounds(&row, bounds);
                    (Vec::new(), header)
                }
                _ => {
                    let header = row.iter().map(|t| t.text.clone()).collect();
                    (row, header)
                }
            };
            current = Some((
                spans,
                RawTable {
                    page_number,
                    header,
                    rows: Vec::new(),
                },
            ));
            continue;
        }

        if let Some((spans, table)) = current.as_mut() {
            let cells = match columns {
                Some(bounds) if !bounds.is_empty() => assign_by_bounds(&row, bounds),
                _ => assign_by_header(&row, spans),
            };
            if cells.iter().any(|c| !c.is_empty()) {
                table.rows.push(cells);
            }
        }
    }

    if let Some((_, table)) = current {
        tables.push(table);
    }

    tables
}

fn assign_by_bounds(row: &[Positioned], bounds: &[f32]) -> Vec<String> {
    let mut cells = vec![String::new(); bounds.len() + 1];
    for token in row {
        let idx = bounds.iter().filter(|b| **b < token.center()).count();
        push_cell(&mut cells[idx], &token.text);
    }
    cells
}

fn assign_by_header(row: &[Positioned], header: &[Positioned]) -> Vec<String> {
    let mut cells = vec![String::new(); header.len()];
    for token in row {
        if let Some(idx) = best_column(token, header) {
            push_cell(&mut cells[idx], &token.text);
        }
    }
    cells
}

/// Column overlapping the token most, or the nearest one by center.
fn best_column(token: &Positioned, header: &[Positioned]) -> Option<usize> {
    let overlapping = header
        .iter()
        .enumerate()
        .map(|(i, h)| (i, token.overlap(h)))
        .filter(|(_, o)| *o > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i);

    overlapping.or_else(|| {
        header
            .iter()
            .enumerate()
            .min_by(|a, b| {
                let da = (a.1.center() - token.center()).abs();
                let db = (b.1.center() - token.center()).abs();
                da.total_cmp(&db)
            })
            .map(|(i, _)| i)
    })
}

fn push_cell(cell: &mut String, text: &str) {
    if !cell.is_empty() {
        cell.push(' ');
    }
    cell.push_str(text);
}
