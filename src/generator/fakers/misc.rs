use serde_json::Value;

use super::data::{BEERS, BEER_STYLES, BREEDS, COLORS, FILE_TYPES, LANGUAGES, NOUNS, PET_CATEGORIES, PET_NAMES, WORDS};
use super::{integer_in, is_integer, is_number, is_string, is_string_or_integer, number_in, pick, string_or_number, text};
use crate::generator::session::Session;
use crate::generator::tree::{FakeError, FakeRequest, Node, NodeRef};

pub(super) fn nodes() -> Vec<NodeRef> {
    vec![
        Node::leaf("color", is_string, color)
            .aliases(&["colour", "colorname"])
            .with_children(vec![Node::leaf("hex", is_string, hex_color).aliases(&["code"]).into_ref()])
            .into_ref(),
        Node::leaf("hexcolor", is_string, hex_color).aliases(&["colorcode", "colorhex"]).into_ref(),
        Node::leaf("language", is_string, language)
            .with_children(vec![Node::leaf("code", is_string, language_code).into_ref()])
            .into_ref(),
        Node::leaf("languagecode", is_string, language_code).aliases(&["lang", "locale"]).into_ref(),
        Node::leaf("pet", is_string, pet_name)
            .aliases(&["petname"])
            .with_children(vec![
                Node::leaf("name", is_string, pet_name).into_ref(),
                Node::leaf("category", is_string, pet_category)
                    .aliases(&["species", "type", "kind"])
                    .into_ref(),
                Node::leaf("breed", is_string, breed).into_ref(),
            ])
            .into_ref(),
        Node::leaf("breed", is_string, breed).into_ref(),
        Node::leaf("species", is_string, pet_category).into_ref(),
        Node::leaf("file", is_string, file_name)
            .aliases(&["filename"])
            .with_children(vec![
                Node::leaf("name", is_string, file_name).into_ref(),
                Node::leaf("type", is_string, mime_type).aliases(&["mimetype", "contenttype"]).into_ref(),
                Node::leaf("extension", is_string, extension).aliases(&["ext"]).into_ref(),
                Node::leaf("size", is_integer, file_size).into_ref(),
                Node::leaf("path", is_string, file_path).into_ref(),
            ])
            .into_ref(),
        Node::leaf("mimetype", is_string, mime_type)
            .aliases(&["contenttype", "mediatype"])
            .into_ref(),
        Node::leaf("extension", is_string, extension).aliases(&["fileextension"]).into_ref(),
        Node::leaf("filesize", is_integer, file_size).into_ref(),
        Node::leaf("filepath", is_string, file_path).aliases(&["path"]).into_ref(),
        Node::leaf("number", is_string_or_integer, number).aliases(&["num", "nr"]).into_ref(),
        Node::leaf("count", is_integer, count).into_ref(),
        Node::leaf("rating", is_number, rating).aliases(&["stars", "score"]).into_ref(),
        Node::leaf("percent", is_number, percent).aliases(&["percentage"]).into_ref(),
        Node::leaf("version", is_string, version).into_ref(),
        Node::leaf("description", is_string, description)
            .aliases(&["summary", "comment", "text", "bio", "note", "notes", "message", "details", "content"])
            .into_ref(),
        Node::leaf("beer", is_string, beer)
            .aliases(&["beername"])
            .with_children(vec![Node::leaf("style", is_string, beer_style).into_ref()])
            .into_ref(),
        Node::leaf("beerstyle", is_string, beer_style).into_ref(),
    ]
}

fn color(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(COLORS[session.rng.index(COLORS.len())].0)
}

fn hex_color(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let [r, g, b] = session.rng.bytes::<3>();
    text(format!("#{:02x}{:02x}{:02x}", r, g, b))
}

fn language(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(LANGUAGES[session.rng.index(LANGUAGES.len())].0)
}

fn language_code(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(LANGUAGES[session.rng.index(LANGUAGES.len())].1)
}

fn pet_name(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, PET_NAMES))
}

fn pet_category(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, PET_CATEGORIES))
}

fn breed(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, BREEDS))
}

fn file_type(session: &mut Session<'_>) -> (&'static str, &'static str) {
    FILE_TYPES[session.rng.index(FILE_TYPES.len())]
}

/// Extension generated earlier in this scope, if known.
fn chosen_extension(session: &Session<'_>) -> Option<&'static str> {
    let ext = session
        .context
        .get_str("extension")
        .or_else(|| session.context.get_str("ext"))?;
    FILE_TYPES.iter().find(|(e, _)| *e == ext).map(|(e, _)| *e)
}

fn file_name(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let ext = match chosen_extension(session) {
        Some(e) => e,
        None => file_type(session).0,
    };
    let stem = pick(session, NOUNS);
    text(format!("{}_{}.{}", stem, session.rng.int_range(1, 999), ext))
}

fn mime_type(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let from_name = session
        .context
        .get_str("filename")
        .or_else(|| session.context.get_str("name"))
        .and_then(|n| n.rsplit_once('.'))
        .and_then(|(_, ext)| FILE_TYPES.iter().find(|(e, _)| *e == ext))
        .map(|(_, mime)| *mime);
    match from_name {
        Some(mime) => text(mime),
        None => text(file_type(session).1),
    }
}

fn extension(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(file_type(session).0)
}

fn file_size(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    integer_in(session, request, 1, 10_000_000)
}

fn file_path(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let dir = pick(session, NOUNS);
    let stem = pick(session, NOUNS);
    let ext = file_type(session).0;
    text(format!("/{}/{}.{}", dir, stem, ext))
}

fn number(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    if is_integer(request) {
        return integer_in(session, request, 0, 1000);
    }
    let n = session.rng.int_range(0, 1000);
    string_or_number(request, n.to_string(), n)
}

fn count(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    integer_in(session, request, 0, 100)
}

fn rating(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    number_in(session, request, 1.0, 5.0, 1)
}

fn percent(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    number_in(session, request, 0.0, 100.0, 2)
}

fn version(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let major = session.rng.int_range(0, 9);
    let minor = session.rng.int_range(0, 20);
    let patch = session.rng.int_range(0, 30);
    text(format!("{}.{}.{}", major, minor, patch))
}

/// Lorem-ipsum sentence fitted into the schema's length bounds.
fn description(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    let schema = request.schema();
    let max = schema.max_length.unwrap_or(120);
    let min = schema.min_length.unwrap_or(0);
    if min > max {
        return Err(FakeError::NotSupported);
    }
    let target = session.rng.usize_range(min.max(max.min(20)), max);
    let mut out = String::new();
    while out.chars().count() < target {
        let word = pick(session, WORDS);
        let sep = if out.is_empty() { 0 } else { 1 };
        if out.chars().count() + sep + word.len() > max {
            break;
        }
        if sep == 1 {
            out.push(' ');
        }
        out.push_str(word);
    }
    if out.chars().count() < min {
        return Err(FakeError::NotSupported);
    }
    let mut chars = out.chars();
    let sentence = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => out,
    };
    text(sentence)
}

fn beer(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, BEERS))
}

fn beer_style(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, BEER_STYLES))
}
