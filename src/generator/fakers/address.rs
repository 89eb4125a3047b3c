use serde_json::{json, Value};

use super::data::{CITIES, COUNTRIES, STATES, STREET_NAMES, STREET_SUFFIXES};
use super::{any, digits, integer_in, is_integer, is_number, is_string, is_string_or_integer, number_in, pick, text, wanted};
use crate::generator::number::float_value;
use crate::generator::schema::SchemaType;
use crate::generator::session::Session;
use crate::generator::tree::{FakeError, FakeRequest, Node, NodeRef};

pub(super) fn nodes() -> Vec<NodeRef> {
    vec![
        Node::leaf("address", is_string, address).aliases(&["fulladdress"]).into_ref(),
        Node::leaf("street", is_string, street)
            .aliases(&["streetaddress", "streetname", "addressline", "addressline1", "address1", "line1"])
            .into_ref(),
        Node::leaf("city", is_string, city).aliases(&["town", "locality"]).into_ref(),
        Node::leaf("zip", is_string_or_integer, zip)
            .aliases(&["zipcode", "postcode", "postalcode", "postal"])
            .into_ref(),
        Node::leaf("state", is_string, state).aliases(&["province", "county"]).into_ref(),
        Node::leaf("country", is_string, country)
            .with_children(vec![
                Node::leaf("code", is_string, country_code).aliases(&["iso"]).into_ref(),
                Node::leaf("name", is_string, country_name).depends(&["code"]).into_ref(),
            ])
            .into_ref(),
        Node::leaf("countrycode", is_string, country_code).aliases(&["countryiso"]).into_ref(),
        Node::leaf("latitude", is_number_or_string, latitude).aliases(&["lat"]).into_ref(),
        Node::leaf("longitude", is_number_or_string, longitude)
            .aliases(&["lon", "lng", "long"])
            .into_ref(),
        Node::leaf("coordinates", any, coordinates)
            .aliases(&["coords", "geo", "geolocation", "location"])
            .into_ref(),
        Node::leaf("floor", is_string_or_integer, floor).into_ref(),
        Node::leaf("room", is_string_or_integer, room).aliases(&["roomnumber"]).into_ref(),
        Node::leaf("housenumber", is_string_or_integer, house_number)
            .aliases(&["buildingnumber", "streetnumber"])
            .into_ref(),
    ]
}

fn is_number_or_string(request: &FakeRequest) -> bool {
    is_number(request) || is_string(request)
}

fn street_line(session: &mut Session<'_>) -> String {
    let len = session.rng.usize_range(2, 4);
    let number = digits(session, len);
    let name = pick(session, STREET_NAMES);
    let suffix = pick(session, STREET_SUFFIXES);
    format!("{} {} {}", number, name, suffix)
}

fn address(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let street = street_line(session);
    let city = pick(session, CITIES);
    let zip = digits(session, 5);
    text(format!("{}, {} {}", street, city, zip))
}

fn street(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(street_line(session))
}

fn city(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, CITIES))
}

fn zip(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    if is_integer(request) {
        return integer_in(session, request, 10_000, 99_999);
    }
    text(digits(session, 5))
}

fn state(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, STATES))
}

fn country(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    let (name, code) = COUNTRIES[session.rng.index(COUNTRIES.len())];
    match request.schema().max_length {
        Some(max) if max < name.len() => text(code),
        _ => text(name),
    }
}

fn country_code(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let (_, code) = COUNTRIES[session.rng.index(COUNTRIES.len())];
    text(code)
}

/// Country name matching a code generated earlier, if any.
fn country_name(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let chosen = ["code", "countrycode"]
        .iter()
        .filter_map(|k| session.context.get_str(k))
        .find_map(|code| COUNTRIES.iter().find(|(_, c)| c.eq_ignore_ascii_case(code)));
    match chosen {
        Some((name, _)) => text(*name),
        None => text(COUNTRIES[session.rng.index(COUNTRIES.len())].0),
    }
}

fn coordinate(session: &mut Session<'_>, request: &FakeRequest, limit: f64) -> Result<Value, FakeError> {
    match wanted(request) {
        Some(SchemaType::String) => {
            let v = -limit + session.rng.float() * 2.0 * limit;
            text(format!("{:.6}", v))
        }
        _ => number_in(session, request, -limit, limit, 6),
    }
}

fn latitude(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    coordinate(session, request, 90.0)
}

fn longitude(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    coordinate(session, request, 180.0)
}

fn coordinates(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    let lat = ((-90.0 + session.rng.float() * 180.0) * 1e6).round() / 1e6;
    let lon = ((-180.0 + session.rng.float() * 360.0) * 1e6).round() / 1e6;
    match wanted(request) {
        Some(SchemaType::Object) => Ok(json!({
            "latitude": float_value(lat),
            "longitude": float_value(lon),
        })),
        Some(SchemaType::String) | None => text(format!("{:.6}, {:.6}", lat, lon)),
        _ => Err(FakeError::NotSupported),
    }
}

fn floor(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    if is_integer(request) {
        return integer_in(session, request, 0, 50);
    }
    text(session.rng.int_range(0, 50).to_string())
}

fn room(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    if is_integer(request) {
        return integer_in(session, request, 100, 999);
    }
    let wing = pick(session, &["A", "B", "C", "D"]);
    text(format!("{}{}", wing, session.rng.int_range(100, 999)))
}

fn house_number(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    if is_integer(request) {
        return integer_in(session, request, 1, 9_999);
    }
    text(session.rng.int_range(1, 9_999).to_string())
}
