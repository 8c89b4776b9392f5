use std::fmt::Write;
use subasta_core::model::{describe_category, AuctionRecord, WeeklyAggregate};
use subasta_core::pipeline::{DocumentStatus, PipelineReport};
use subasta_core::ParsedDocument;

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

pub fn format_report(report: &PipelineReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Run summary ===\n");
    let _ = writeln!(
        out,
        "  Documents: {} requested, {} fetched, {} assembled, {} rejected",
        report.documents_requested,
        report.documents_fetched,
        report.documents_assembled,
        report.documents_rejected
    );
    let _ = writeln!(
        out,
        "  Lines:     {} gated, {} not decomposed",
        report.lines_gated, report.lines_undecomposed
    );
    let _ = writeln!(
        out,
        "  Rows:      {} assembled, {} discarded, {} superseded, {} date conflict(s)",
        report.rows_assembled,
        report.rows_discarded,
        report.rows_abandoned,
        report.date_conflicts
    );
    let c = &report.clean;
    let _ = writeln!(
        out,
        "  Cleaning:  {} in, {} missing essentials, {} non-positive, {} outside band, {} kept",
        c.input, c.missing_essential, c.non_positive, c.outside_band, c.retained
    );
    let _ = writeln!(
        out,
        "  Weekly:    {} group(s), {} dropped",
        report.weekly_groups, report.weekly_groups_dropped
    );

    if !report.documents.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "  {:>6}  {:<8}  {:<10}  {:>5}  Status",
            "Doc", "Feria", "Date", "Rows"
        );
        for d in &report.documents {
            let _ = writeln!(
                out,
                "  {:>6}  {:<8}  {:<10}  {:>5}  {}",
                d.document_id,
                d.fair_sequence_number.as_deref().unwrap_or("-"),
                opt(d.fair_date),
                d.rows,
                d.status
            );
        }
    }
    out.trim_end().to_string()
}

pub fn format_weekly(rows: &[WeeklyAggregate]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Weekly prices ===\n");
    if rows.is_empty() {
        let _ = writeln!(out, "  (no groups)");
        return out.trim_end().to_string();
    }

    let _ = writeln!(
        out,
        "  {:<10}  {:<4}  {:>12}  {:>5}  {:<20}",
        "Week", "Cat", "Avg price", "Lots", "Description"
    );
    for r in rows {
        let _ = writeln!(
            out,
            "  {:<10}  {:<4}  {:>12}  {:>5}  {:<20}",
            r.week_start_date,
            r.sex_category,
            format!("{:.2}", r.weighted_average_price),
            r.lot_count,
            describe_category(&r.sex_category).unwrap_or("")
        );
    }
    out.trim_end().to_string()
}

fn format_lot(out: &mut String, r: &AuctionRecord) {
    let _ = writeln!(
        out,
        "  {:>4}  {:<4}  {:>4}  {:>7}  {:>6}  {:>10}  {:<20}",
        r.lot_number,
        r.sex_category,
        r.head_count,
        r.total_weight_kg,
        opt(r.average_weight_kg),
        format!("{:.2}", r.final_price),
        r.origin.as_deref().unwrap_or("")
    );
}

pub fn format_parsed(parsed: &ParsedDocument) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Document {} ===\n", parsed.document_id);
    let _ = writeln!(
        out,
        "  Feria: {}  Date: {}",
        parsed.metadata.fair_sequence_number.as_deref().unwrap_or("-"),
        opt(parsed.metadata.fair_date)
    );
    if let DocumentStatus::Rejected(reason) = &parsed.status {
        let _ = writeln!(out, "  Rejected: {reason}");
        return out.trim_end().to_string();
    }

    let strategy = match (&parsed.strategy, &parsed.table_attempt) {
        (Some(s), Some(attempt)) => format!("{s:?} ({attempt})"),
        (Some(s), None) => format!("{s:?}"),
        (None, _) => "none".to_string(),
    };
    let _ = writeln!(out, "  Strategy: {strategy}");
    let _ = writeln!(
        out,
        "  {} line(s) gated, {} not decomposed, {} row(s) discarded, {} kept after cleaning\n",
        parsed.lines_gated, parsed.lines_undecomposed, parsed.rows_discarded, parsed.clean.retained
    );

    if parsed.records.is_empty() {
        let _ = writeln!(out, "  (no lots)");
        return out.trim_end().to_string();
    }
    let _ = writeln!(
        out,
        "  {:>4}  {:<4}  {:>4}  {:>7}  {:>6}  {:>10}  {:<20}",
        "Lot", "Cat", "Head", "Kg", "Avg", "Price", "Origin"
    );
    for r in &parsed.records {
        format_lot(&mut out, r);
    }
    out.trim_end().to_string()
}
