//! Customer command presentation: page listing and single-record text/json.

use comfy_table::Table;
use serde_json::json;

use crate::customers::{Customer, CustomerPage};

pub fn format_customer_page_text(page: &CustomerPage) -> String {
    if page.data.is_empty() {
        return format!("No customers on page {} of {}.", page.page, page.total_pages);
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec![
        "ID",
        "Customer ID",
        "Name",
        "Company",
        "Country",
        "Email",
        "Subscribed",
    ]);
    for c in &page.data {
        table.add_row(vec![
            c.id.clone(),
            c.customer_id.clone(),
            c.full_name(),
            c.company.clone(),
            c.country.clone(),
            c.email.clone(),
            c.subscription_date.clone(),
        ]);
    }
    format!("{}\nPage {} of {}", table, page.page, page.total_pages)
}

pub fn format_customer_page_json(page: &CustomerPage) -> String {
    let out = json!({
        "customers": page.data,
        "page": page.page,
        "total_pages": page.total_pages,
    });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_customer_text(action: &str, customer: &Customer) -> String {
    let mut output = format!("{} customer {}\n", action, customer.id);
    output.push_str(&format!("  Customer ID: {}\n", customer.customer_id));
    output.push_str(&format!("  Name: {}\n", customer.full_name()));
    output.push_str(&format!("  Email: {}", customer.email));
    if !customer.company.is_empty() {
        output.push_str(&format!("\n  Company: {}", customer.company));
    }
    output
}
