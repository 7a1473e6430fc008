//! Minimal Vizier client speaking the `asu-tsv` cone-search interface.
//!
//! The TSV output is a block of `#` comments followed by a header row, a
//! units row, a dashes separator row and the data rows. Blank cells are
//! treated as missing values.

use tracing::debug;
use url::Url;

use crate::provider::ConeSearch;
use crate::{CatalogError, Result};

/// Default Vizier mirror.
pub const DEFAULT_VIZIER_BASE: &str = "https://vizier.cds.unistra.fr";

/// A parsed Vizier TSV table.
#[derive(Debug, Clone)]
pub struct TsvTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

fn is_dash_row(line: &str) -> bool {
    !line.is_empty()
        && line
            .split('\t')
            .all(|cell| !cell.is_empty() && cell.chars().all(|c| c == '-'))
}

impl TsvTable {
    /// Parse the body of an `asu-tsv` response.
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
            .collect();

        let (header, data_start) = match lines.as_slice() {
            // header, units, dashes, data...
            [h, _, d, ..] if is_dash_row(d) => (*h, 3),
            // header, dashes, data...
            [h, d, ..] if is_dash_row(d) => (*h, 2),
            [h, ..] => (*h, 1),
            [] => {
                return Self {
                    columns: Vec::new(),
                    rows: Vec::new(),
                }
            }
        };

        let columns: Vec<String> = header.split('\t').map(|c| c.trim().to_string()).collect();
        let rows = lines[data_start..]
            .iter()
            .map(|line| {
                let mut cells: Vec<Option<String>> = line
                    .split('\t')
                    .map(|c| {
                        let c = c.trim();
                        if c.is_empty() {
                            None
                        } else {
                            Some(c.to_string())
                        }
                    })
                    .collect();
                cells.resize(columns.len(), None);
                cells
            })
            .collect();

        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell value by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    pub fn get_f64(&self, row: usize, column: &str) -> Option<f64> {
        self.get(row, column)?.parse().ok()
    }

    /// Row indices, for iteration.
    pub fn row_indices(&self) -> std::ops::Range<usize> {
        0..self.rows.len()
    }
}

/// Blocking HTTP client for Vizier catalog queries.
#[derive(Debug, Clone)]
pub struct VizierClient {
    base_url: String,
}

impl Default for VizierClient {
    fn default() -> Self {
        Self::new()
    }
}

impl VizierClient {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_VIZIER_BASE.to_string(),
        }
    }

    /// Use a different mirror (or a test server).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Base URL of the mirror, without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Build the `asu-tsv` query URL from raw ASU parameters.
    pub fn query_url(&self, catalog: &str, params: &[(&str, String)]) -> Result<String> {
        let mut url = Url::parse(&format!("{}/viz-bin/asu-tsv", self.base_url()))
            .map_err(|e| CatalogError::Parse {
                service: "Vizier".to_string(),
                detail: format!("bad base URL {:?}: {e}", self.base_url),
            })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("-source", catalog);
            pairs.append_pair("-out.max", "unlimited");
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    /// Issue a query with raw ASU parameters and parse the TSV response.
    pub fn query(&self, catalog: &str, params: &[(&str, String)]) -> Result<TsvTable> {
        let url = self.query_url(catalog, params)?;
        debug!(%url, "Vizier query");
        let mut response = ureq::get(&url).call().map_err(|e| CatalogError::Http {
            url: url.clone(),
            source: Box::new(e),
        })?;
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| CatalogError::Http {
                url: url.clone(),
                source: Box::new(e),
            })?;
        Ok(TsvTable::parse(&body))
    }

    /// Cone search in `catalog` returning the requested columns.
    ///
    /// `filters` are extra ASU column constraints, e.g. `("Gmag", "<18")`.
    pub fn query_region(
        &self,
        catalog: &str,
        cone: &ConeSearch,
        columns: &[&str],
        filters: &[(&str, String)],
    ) -> Result<TsvTable> {
        let mut params: Vec<(&str, String)> = vec![
            ("-c", format!("{:+.8} {:+.8}", cone.ra_deg, cone.dec_deg)),
            ("-c.r", format!("{:.4}", cone.radius_arcsec)),
            ("-c.u", "arcsec".to_string()),
        ];
        for column in columns {
            params.push(("-out", column.to_string()));
        }
        params.extend(filters.iter().map(|(k, v)| (*k, v.clone())));
        self.query(catalog, &params)
    }

    /// Query by column constraints only (no cone), e.g. a TIC id lookup.
    pub fn query_constraints(
        &self,
        catalog: &str,
        columns: &[&str],
        constraints: &[(&str, String)],
    ) -> Result<TsvTable> {
        let mut params: Vec<(&str, String)> = Vec::new();
        for column in columns {
            params.push(("-out", column.to_string()));
        }
        params.extend(constraints.iter().map(|(k, v)| (*k, v.clone())));
        self.query(catalog, &params)
    }
}
