//! Invoice field catalog.
//!
//! The catalog is what the UI offers by default and what `/api/fields`
//! reports. Callers may request any other field name; unknown names get a
//! generic description and are treated as free text.

/// Standard invoice fields, in display order.
pub const COMMON_FIELDS: &[&str] = &[
    "vendor_name",
    "invoice_number",
    "invoice_date",
    "due_date",
    "total_amount",
    "tax_amount",
    "line_items",
    "item_description",
    "item_quantity",
    "item_unit_price",
    "item_total",
];

pub const LINE_ITEMS: &str = "line_items";

/// Human description of a catalog field, `None` for custom fields.
fn catalog_description(field: &str) -> Option<&'static str> {
    let d = match field {
        "vendor_name" => "The name of the company or individual providing the goods/services",
        "invoice_number" => "Unique identifier for this invoice",
        "invoice_date" => "Date when the invoice was issued",
        "due_date" => "Payment due date",
        "total_amount" => "Total amount due including taxes",
        "tax_amount" => "Total tax amount",
        "line_items" => "List of individual items/services with details",
        "item_description" => "Description of each item/service",
        "item_quantity" => "Quantity of each item",
        "item_unit_price" => "Price per unit for each item",
        "item_total" => "Total amount for each line item",
        _ => return None,
    };
    Some(d)
}

/// Description used in the REQUIRED FIELDS section of the prompt.
pub fn describe(field: &str) -> String {
    catalog_description(field)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Extract {field} from the invoice"))
}

/// `(field, description)` pairs for every catalog field.
pub fn catalog() -> impl Iterator<Item = (&'static str, &'static str)> {
    COMMON_FIELDS
        .iter()
        .filter_map(|f| catalog_description(f).map(|d| (*f, d)))
}

/// Shape of the value a field is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    LineItems,
    Amount,
    Date,
    Quantity,
    Text,
}

impl FieldKind {
    pub fn of(field: &str) -> Self {
        match field {
            LINE_ITEMS => Self::LineItems,
            "total_amount" | "tax_amount" | "item_unit_price" | "item_total" => Self::Amount,
            "invoice_date" | "due_date" => Self::Date,
            "item_quantity" => Self::Quantity,
            _ => Self::Text,
        }
    }
}

/// `invoice_number` → `Invoice Number`.
pub fn humanize(field: &str) -> String {
    field
        .replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trim names, drop empty entries and repeats. First occurrence wins.
pub fn normalize_field_list<I, S>(fields: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for f in fields {
        let f = f.as_ref().trim();
        if f.is_empty() || out.iter().any(|seen| seen == f) {
            continue;
        }
        out.push(f.to_string());
    }
    out
}
