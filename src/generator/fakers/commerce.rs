use serde_json::Value;

use super::data::{
    CARD_BRANDS, COMPANY_SUFFIXES, CURRENCIES, DEPARTMENTS, INDUSTRIES, LAST_NAMES, PRODUCTS, PRODUCT_ADJECTIVES,
    PRODUCT_CATEGORIES, PRODUCT_MATERIALS,
};
use super::{digits, integer_in, is_integer, is_number, is_string, is_string_or_integer, number_in, pick, text};
use crate::generator::session::Session;
use crate::generator::string::random_from;
use crate::generator::tree::{FakeError, FakeRequest, Node, NodeRef};

/// Context keys a currency code may have been stored under.
const CURRENCY_CODE_KEYS: &[&str] = &["currencycode", "code", "currency"];

pub(super) fn nodes() -> Vec<NodeRef> {
    vec![
        Node::leaf("company", is_string, company)
            .aliases(&["companyname", "organization", "organisation", "employer", "business", "firm", "vendor"])
            .with_children(vec![Node::leaf("name", is_string, company).into_ref()])
            .into_ref(),
        Node::leaf("department", is_string, department).aliases(&["division"]).into_ref(),
        Node::leaf("industry", is_string, industry).aliases(&["sector"]).into_ref(),
        Node::leaf("currency", is_string, currency_code)
            .aliases(&["currencycode"])
            .with_children(vec![
                Node::leaf("code", is_string, currency_code).aliases(&["iso"]).into_ref(),
                Node::leaf("name", is_string, currency_name).depends(&["code"]).into_ref(),
                Node::leaf("symbol", is_string, currency_symbol).depends(&["code"]).into_ref(),
            ])
            .into_ref(),
        Node::leaf("creditcard", is_string, card_number)
            .aliases(&["creditcardnumber", "cardnumber", "ccnumber", "pan"])
            .with_children(vec![
                Node::leaf("number", is_string, card_number).into_ref(),
                Node::leaf("cvv", is_string_or_integer, cvv).aliases(&["cvc"]).into_ref(),
                Node::leaf("type", is_string, card_type).aliases(&["brand"]).into_ref(),
                Node::leaf("expiry", is_string, card_expiry)
                    .aliases(&["expires", "expiration", "expirationdate"])
                    .into_ref(),
            ])
            .into_ref(),
        Node::leaf("cvv", is_string_or_integer, cvv).aliases(&["cvc", "securitycode"]).into_ref(),
        Node::leaf("cardtype", is_string, card_type).aliases(&["cardbrand"]).into_ref(),
        Node::leaf("product", is_string, product)
            .aliases(&["productname"])
            .with_children(vec![
                Node::leaf("name", is_string, product).into_ref(),
                Node::leaf("category", is_string, product_category).into_ref(),
                Node::leaf("material", is_string, material).into_ref(),
                Node::leaf("price", is_number, price).into_ref(),
            ])
            .into_ref(),
        Node::leaf("category", is_string, product_category)
            .aliases(&["productcategory"])
            .into_ref(),
        Node::leaf("material", is_string, material).into_ref(),
        Node::leaf("price", is_number, price)
            .aliases(&["cost", "amount", "total", "subtotal", "unitprice", "fee"])
            .into_ref(),
        Node::leaf("sku", is_string, sku).into_ref(),
        Node::leaf("quantity", is_integer, quantity)
            .aliases(&["qty", "stock", "instock"])
            .into_ref(),
    ]
}

fn company(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let name = match session.rng.int_range(0, 2) {
        0 => {
            let a = pick(session, LAST_NAMES);
            let b = pick(session, LAST_NAMES);
            format!("{} and {}", a, b)
        }
        _ => {
            let last = pick(session, LAST_NAMES);
            let suffix = pick(session, COMPANY_SUFFIXES);
            format!("{} {}", last, suffix)
        }
    };
    text(name)
}

fn department(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, DEPARTMENTS))
}

fn industry(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, INDUSTRIES))
}

/// Currency chosen earlier in this scope, if any.
fn chosen_currency(session: &Session<'_>) -> Option<&'static (&'static str, &'static str, &'static str)> {
    CURRENCY_CODE_KEYS
        .iter()
        .filter_map(|k| session.context.get_str(k))
        .find_map(|code| CURRENCIES.iter().find(|(c, _, _)| c.eq_ignore_ascii_case(code)))
}

fn any_currency(session: &mut Session<'_>) -> &'static (&'static str, &'static str, &'static str) {
    &CURRENCIES[session.rng.index(CURRENCIES.len())]
}

fn currency_code(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(any_currency(session).0)
}

fn currency_name(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let currency = match chosen_currency(session) {
        Some(c) => c,
        None => any_currency(session),
    };
    text(currency.1)
}

fn currency_symbol(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let currency = match chosen_currency(session) {
        Some(c) => c,
        None => any_currency(session),
    };
    text(currency.2)
}

/// Check digit making `payload` pass the Luhn test.
pub(crate) fn luhn_digit(payload: &str) -> u32 {
    let sum: u32 = payload
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    (10 - sum % 10) % 10
}

fn card_number(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let (_, prefix, len) = CARD_BRANDS[session.rng.index(CARD_BRANDS.len())];
    let mut number = prefix.to_string();
    while number.len() < len - 1 {
        number.push(char::from(b'0' + session.rng.int_range(0, 9) as u8));
    }
    let check = luhn_digit(&number);
    number.push_str(&check.to_string());
    text(number)
}

fn cvv(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    if is_integer(request) {
        return integer_in(session, request, 100, 999);
    }
    text(digits(session, 3))
}

fn card_type(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(CARD_BRANDS[session.rng.index(CARD_BRANDS.len())].0)
}

fn card_expiry(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let month = session.rng.int_range(1, 12);
    let year = session.rng.int_range(27, 35);
    text(format!("{:02}/{}", month, year))
}

fn product(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let adjective = pick(session, PRODUCT_ADJECTIVES);
    let material = pick(session, PRODUCT_MATERIALS);
    let product = pick(session, PRODUCTS);
    text(format!("{} {} {}", adjective, material, product))
}

fn product_category(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, PRODUCT_CATEGORIES))
}

fn material(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, PRODUCT_MATERIALS))
}

fn price(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    number_in(session, request, 1.0, 1000.0, 2)
}

fn sku(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(format!("SKU-{}", random_from(session, "ABCDEFGHJKLMNPQRSTUVWXYZ0123456789", 8)))
}

fn quantity(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    integer_in(session, request, 1, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luhn_check_digit() {
        assert_eq!(luhn_digit("7992739871"), 3);
        assert_eq!(luhn_digit("453201511283036"), 6);
    }
}
