//! HTML assembly for the two pages.
//!
//! No template engine: the pages are small enough that plain string
//! building with explicit escaping stays readable. Figures arrive as
//! inline SVG, so the only client-side script is the pair of period
//! scaling buttons on the light-curve form.

use lightcurve::TimeFormat;

use crate::params::{LightCurveParams, SkyViewParams};

pub const APP_TITLE: &str = "TESS SkyView with Gaia DR3, ZTF and VSX";

/// Escape text for use in HTML body or attribute context.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap body content in the shared page shell.
pub fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 1.5em; max-width: 72em; }}
table {{ border-collapse: collapse; margin: 0.5em 0; }}
th, td {{ border: 1px solid #ccc; padding: 0.2em 0.5em; text-align: left; font-size: 90%; }}
form.inline label {{ margin-right: 1em; }}
input[type=text], input[type=number] {{ width: 14em; }}
.error {{ background: #fdd; border: 1px solid #c33; padding: 0.5em 1em; margin: 0.5em 0; }}
.note {{ background: #ffd; border: 1px solid #cc3; padding: 0.5em 1em; margin: 0.5em 0; }}
.swatch {{ display: inline-block; width: 0.8em; height: 0.8em; border-radius: 50%; margin-right: 0.4em; }}
details {{ margin: 0.8em 0; }}
</style>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape(title),
        body = body
    )
}

/// An inline error banner; rendering continues around it.
pub fn error_box(message: &str) -> String {
    format!(r#"<div class="error">{}</div>"#, escape(message))
}

/// An informational banner.
pub fn note_box(message: &str) -> String {
    format!(r#"<div class="note">{}</div>"#, escape(message))
}

fn opt_value<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// The target search form at the top of the skyview page.
pub fn search_form(params: &SkyViewParams) -> String {
    format!(
        r#"<form class="inline" method="get" action="/">
<label>TIC <input type="text" name="tic" value="{tic}" placeholder="e.g. 261136679"></label>
<label>Sector <input type="text" name="sector" value="{sector}" placeholder="optional, latest if not specified"></label>
<label>Magnitude limit <input type="text" name="magnitude_limit" value="{maglim}" placeholder="optional, Tmag + 7 if not specified"></label>
<button type="submit">Show</button>
</form>"#,
        tic = opt_value(params.tic),
        sector = opt_value(params.sector),
        maglim = opt_value(params.magnitude_limit),
    )
}

/// The light-curve viewer form, with period scaling buttons.
pub fn lightcurve_form(params: &LightCurveParams) -> String {
    let format_option = |format: TimeFormat, value: &str, label: &str| {
        let selected = if params.epoch_format == format {
            " selected"
        } else {
            ""
        };
        format!(r#"<option value="{value}"{selected}>{label}</option>"#)
    };
    format!(
        r#"<script>
function scalePeriod(factor) {{
  var input = document.getElementById('period');
  var value = parseFloat(input.value);
  if (value > 0) {{
    input.value = (value * factor).toPrecision(8);
    input.form.submit();
  }}
}}
</script>
<form class="inline" method="get" action="/lightcurve">
<label>CSV URL <input type="text" name="url" value="{url}" size="60"></label><br>
<label>Period [d] <input type="text" name="period" id="period" value="{period}"></label>
<button type="button" onclick="scalePeriod(0.5)">&frac12;P</button>
<button type="button" onclick="scalePeriod(2)">2&times;P</button>
<label>Epoch <input type="text" name="epoch" value="{epoch}"></label>
<label>Epoch format <select name="epoch_format">{btjd}{hjd}</select></label>
<label><input type="checkbox" name="cmap" value="1"{cmap}> Color by time</label>
<button type="submit">Plot</button>
</form>"#,
        url = escape(params.url.as_deref().unwrap_or("")),
        period = opt_value(params.period_days),
        epoch = opt_value(params.epoch),
        btjd = format_option(TimeFormat::Btjd, "btjd", "BTJD"),
        hjd = format_option(TimeFormat::Hjd, "hjd", "HJD"),
        cmap = if params.cmap { " checked" } else { "" },
    )
}

/// One table row of a catalog section.
#[derive(Debug, Clone)]
pub struct SourceRow {
    /// Label/value pairs shown as plain-text columns.
    pub tooltip: Vec<(String, String)>,
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub separation_arcsec: f64,
    /// Zero-based pixel position on the stamp, when the cube has a WCS.
    pub pixel: Option<(f64, f64)>,
    /// Pre-built HTML detail fragment (may contain links).
    pub detail_html: String,
    /// Internal light-curve viewer link, already URL encoded.
    pub lightcurve_href: Option<String>,
}

/// Render detail rows and links of a source into an HTML fragment. Detail
/// values are trusted HTML built by the catalog adapters.
pub fn detail_fragment(detail: &catalogs::DetailView) -> String {
    let mut parts: Vec<String> = detail
        .rows
        .iter()
        .map(|(label, value)| format!("{}: {}", escape(label), value))
        .collect();
    parts.extend(detail.extra_links.iter().cloned());
    parts.join("<br>")
}

/// A collapsible per-catalog source table.
pub fn source_section(label: &str, color: &str, rows: &[SourceRow]) -> String {
    let mut out = format!(
        r#"<details open><summary><span class="swatch" style="background:{}"></span>{} ({} source{})</summary>"#,
        escape(color),
        escape(label),
        rows.len(),
        if rows.len() == 1 { "" } else { "s" },
    );
    if rows.is_empty() {
        out.push_str("<p>No sources in the field.</p></details>");
        return out;
    }

    out.push_str("<table><tr><th>#</th>");
    for (column, _) in &rows[0].tooltip {
        out.push_str(&format!("<th>{}</th>", escape(column)));
    }
    out.push_str(
        "<th>RA (J2000)</th><th>Dec (J2000)</th><th>Sep [\"]</th>\
         <th>Column</th><th>Row</th><th>Details</th></tr>",
    );

    for (i, row) in rows.iter().enumerate() {
        out.push_str(&format!("<tr><td>{}</td>", i + 1));
        for (_, value) in &row.tooltip {
            out.push_str(&format!("<td>{}</td>", escape(value)));
        }
        out.push_str(&format!(
            "<td>{:.5}</td><td>{:+.5}</td><td>{:.1}</td>",
            row.ra_deg, row.dec_deg, row.separation_arcsec
        ));
        match row.pixel {
            Some((x, y)) => out.push_str(&format!("<td>{x:.2}</td><td>{y:.2}</td>")),
            None => out.push_str("<td></td><td></td>"),
        }
        out.push_str("<td>");
        out.push_str(&row.detail_html);
        if let Some(href) = &row.lightcurve_href {
            if !row.detail_html.is_empty() {
                out.push_str("<br>");
            }
            out.push_str(&format!(
                r#"<a href="{}">plot light curve</a>"#,
                escape(href)
            ));
        }
        out.push_str("</td></tr>");
    }
    out.push_str("</table></details>");
    out
}
