use crate::domain::kpi::format_amount;
use crate::domain::report::Report;
use std::fmt::Write;

/// Telegram's hard cap on one message.
pub const MESSAGE_LIMIT: usize = 4096;

fn trend(variation: f64) -> &'static str {
    if variation > 0.0 {
        "up"
    } else if variation < 0.0 {
        "down"
    } else {
        "flat"
    }
}

/// Plain-text rendering of a report, sent without any parse mode.
pub fn render_report_text(report: &Report) -> String {
    let k = &report.kpis;
    let c = &report.comparison;
    let currency = report.currency.as_str();
    let mut out = String::new();

    let _ = writeln!(out, "{} report - {}", report.period_label, report.company_name);
    let _ = writeln!(out, "{}", report.period_range);
    out.push('\n');

    out.push_str("Key figures\n");
    let _ = writeln!(
        out,
        "Revenue: {} {currency} ({} {:+.1}%)",
        format_amount(k.revenue),
        trend(c.revenue_variation_pct),
        c.revenue_variation_pct
    );
    let _ = writeln!(
        out,
        "Orders: {} ({} {:+.1}%)",
        k.order_count,
        trend(c.order_variation_pct),
        c.order_variation_pct
    );
    let _ = writeln!(out, "New customers: {}", k.new_customers);
    let _ = writeln!(
        out,
        "Returning customers: {} ({:+})",
        k.returning_customers, c.returning_customers_delta
    );
    if k.stock_alert_count > 0 {
        let _ = writeln!(out, "Stock alerts: {}", k.stock_alert_count);
    }
    let _ = writeln!(
        out,
        "Expenses: {} {currency} ({} {:+.1}%)",
        format_amount(k.expenses),
        trend(c.expense_variation_pct),
        c.expense_variation_pct
    );
    let _ = writeln!(out, "Net result: {} {currency}", format_amount(k.net_result));

    if !report.insights.is_empty() {
        out.push_str("\nHighlights\n");
        for scored in &report.insights {
            let i = &scored.insight;
            let _ = writeln!(out, "[P{}] {}: {}", i.priority, i.title, i.description);
        }
    }

    if !report.recommendations.trim().is_empty() {
        out.push_str("\nRecommendations\n");
        out.push_str(report.recommendations.trim());
        out.push('\n');
    }

    out.trim_end().to_string()
}

/// Splits on line boundaries so no chunk exceeds `limit` characters. A single line longer
/// than `limit` is cut at character boundaries.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.lines() {
        let mut line: Vec<char> = line.chars().collect();
        while line.len() > limit {
            if current_len > 0 {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = line.split_off(limit);
            chunks.push(line.into_iter().collect());
            line = rest;
        }

        let needed = line.len() + usize::from(current_len > 0);
        if current_len + needed > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push('\n');
            current_len += 1;
        }
        current.extend(line.iter());
        current_len += line.len();
    }
    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}
