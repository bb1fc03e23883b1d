//! Terminal rendering for the `velovis_cli` binary.

use crate::cart::CartState;
use crate::api::{Order, Product};

const MAX_COL_WIDTH: usize = 48;

/// Render rows under a header as an ASCII table. Numbers align right.
pub fn render_table(columns: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| display_len(c).min(MAX_COL_WIDTH)).collect();
    for r in rows {
        for (i, cell) in r.iter().enumerate().take(columns.len()) {
            widths[i] = widths[i].max(display_len(cell).min(MAX_COL_WIDTH));
        }
    }
    let header: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    let sep = build_separator(&widths);
    let mut out = Vec::with_capacity(rows.len() + 4);
    out.push(sep.clone());
    out.push(build_row(&header, &widths));
    out.push(sep.clone());
    for r in rows {
        out.push(build_row(r, &widths));
    }
    out.push(sep);
    out.join("\n")
}

pub fn products_table(products: &[Product]) -> String {
    let rows: Vec<Vec<String>> = products
        .iter()
        .map(|p| {
            vec![
                p.id.clone(),
                p.name.clone(),
                format!("{:.2}", p.price),
                p.stock_quantity.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
                p.slug.clone(),
            ]
        })
        .collect();
    render_table(&["id", "name", "price", "stock", "slug"], &rows)
}

pub fn cart_table(cart: &CartState) -> String {
    let rows: Vec<Vec<String>> = cart
        .items
        .iter()
        .map(|i| {
            vec![
                i.id.clone(),
                i.product.name.clone(),
                i.size.clone().unwrap_or_else(|| "-".into()),
                i.quantity.to_string(),
                format!("{:.2}", i.line_total()),
            ]
        })
        .collect();
    format!(
        "{}\nitems: {}, total: {:.2}",
        render_table(&["line", "product", "size", "qty", "total"], &rows),
        cart.total_quantity(),
        cart.total_price()
    )
}

pub fn orders_table(orders: &[Order]) -> String {
    let rows: Vec<Vec<String>> = orders
        .iter()
        .map(|o| {
            vec![
                o.id.clone(),
                o.status.to_string(),
                o.total_price.map(|p| format!("{:.2}", p)).unwrap_or_default(),
                o.created_at.clone().unwrap_or_default(),
            ]
        })
        .collect();
    render_table(&["order", "status", "total", "created"], &rows)
}

fn display_len(s: &str) -> usize { s.chars().count() }

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::from("+");
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::from("|");
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        let text = truncate(cell, *w);
        let pad = " ".repeat(w.saturating_sub(display_len(&text)));
        s.push(' ');
        if is_numeric_like(&text) {
            s.push_str(&pad);
            s.push_str(&text);
        } else {
            s.push_str(&text);
            s.push_str(&pad);
        }
        s.push_str(" |");
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max { return s.to_string(); }
    if max <= 1 { return "…".to_string(); }
    s.chars().take(max - 1).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    let st = s.trim();
    st.chars().any(|c| c.is_ascii_digit()) && st.chars().all(|c| c.is_ascii_digit() || ".-+,".contains(c))
}
