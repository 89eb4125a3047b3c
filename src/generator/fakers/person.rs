use serde_json::Value;

use super::data::{FEMALE_FIRST_NAMES, JOB_TITLES, LAST_NAMES, MALE_FIRST_NAMES, TITLES};
use super::{digits, integer_in, is_integer, is_string, pick, text, time};
use crate::generator::session::Session;
use crate::generator::tree::{FakeError, FakeRequest, Node, NodeRef};

pub(super) fn nodes() -> Vec<NodeRef> {
    vec![
        Node::leaf("firstname", is_string, first_name)
            .aliases(&["forename", "givenname"])
            .depends(&["gender"])
            .into_ref(),
        Node::leaf("lastname", is_string, last_name)
            .aliases(&["surname", "familyname"])
            .into_ref(),
        Node::leaf("fullname", is_string, full_name)
            .aliases(&["name", "displayname", "personname", "contactname"])
            .depends(&["firstname", "lastname"])
            .into_ref(),
        Node::leaf("gender", is_string, gender).aliases(&["sex"]).into_ref(),
        Node::leaf("phone", is_string, phone)
            .aliases(&["phonenumber", "telephone", "tel", "mobile", "mobilephone", "cellphone", "fax"])
            .into_ref(),
        Node::leaf("title", is_string, title)
            .aliases(&["salutation", "honorific", "nameprefix"])
            .into_ref(),
        Node::leaf("jobtitle", is_string, job_title)
            .aliases(&["occupation", "profession", "jobposition"])
            .into_ref(),
        Node::leaf("age", is_integer, age).into_ref(),
        Node::leaf("birthday", time::is_date, birthday)
            .aliases(&["birthdate", "dateofbirth", "dob"])
            .into_ref(),
    ]
}

fn gender_hint(session: &Session<'_>) -> Option<bool> {
    let g = session
        .context
        .get_str("gender")
        .or_else(|| session.context.get_str("sex"))?
        .to_ascii_lowercase();
    match g.as_str() {
        "female" | "f" | "woman" => Some(true),
        "male" | "m" | "man" => Some(false),
        _ => None,
    }
}

fn first_name(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let female = match gender_hint(session) {
        Some(f) => f,
        None => session.rng.chance(0.5),
    };
    let first = pick(session, if female { FEMALE_FIRST_NAMES } else { MALE_FIRST_NAMES });
    let last = pick(session, LAST_NAMES);
    session.context.offer("lastname", Value::from(last));
    session
        .context
        .offer("gender", Value::from(if female { "female" } else { "male" }));
    text(first)
}

fn last_name(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, LAST_NAMES))
}

fn full_name(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let first = match session.context.get_str("firstname") {
        Some(s) => s.to_string(),
        None => {
            let list = if session.rng.chance(0.5) { FEMALE_FIRST_NAMES } else { MALE_FIRST_NAMES };
            pick(session, list).to_string()
        }
    };
    let last = match session.context.get_str("lastname") {
        Some(s) => s.to_string(),
        None => pick(session, LAST_NAMES).to_string(),
    };
    text(format!("{} {}", first, last))
}

fn gender(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, &["male", "female"]))
}

fn phone(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let area = digits(session, 3);
    let exchange = digits(session, 3);
    let line = digits(session, 4);
    text(format!("+1-{}-{}-{}", area, exchange, line))
}

fn title(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let title = match gender_hint(session) {
        Some(true) => pick(session, &["Mrs.", "Ms.", "Miss", "Dr."]),
        Some(false) => pick(session, &["Mr.", "Dr.", "Prof."]),
        None => pick(session, TITLES),
    };
    text(title)
}

fn job_title(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, JOB_TITLES))
}

fn age(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    integer_in(session, request, 18, 90)
}

fn birthday(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    let dt = time::random_datetime(session, 1940, 2006);
    time::date_value(request, dt)
}
