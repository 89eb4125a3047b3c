use serde_json::Value;
use sha2::{Digest, Sha256};

use super::data::{EMAIL_DOMAINS, ERRORS, NOUNS, TLDS};
use super::{any, integer_in, is_integer, is_string, pick, text, wanted};
use crate::generator::schema::SchemaType;
use crate::generator::session::Session;
use crate::generator::string::random_from;
use crate::generator::tree::{FakeError, FakeRequest, Node, NodeRef};

const ALNUM: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "curl/8.4.0",
];

pub(super) fn nodes() -> Vec<NodeRef> {
    vec![
        Node::leaf("email", is_string, email_leaf)
            .aliases(&["mail", "emailaddress"])
            .depends(&["firstname", "lastname"])
            .into_ref(),
        Node::leaf("username", is_string, username)
            .aliases(&["user", "login", "nickname", "handle"])
            .depends(&["firstname", "lastname"])
            .into_ref(),
        Node::leaf("password", is_string, password).aliases(&["pwd", "passphrase"]).into_ref(),
        Node::leaf("url", is_string, url_leaf)
            .aliases(&["uri", "link", "website", "homepage", "href"])
            .into_ref(),
        Node::leaf("domain", is_string, domain_leaf)
            .aliases(&["domainname", "hostname", "host"])
            .into_ref(),
        Node::leaf("ipv4", is_string, ipv4_leaf).aliases(&["ip", "ipaddress"]).into_ref(),
        Node::leaf("ipv6", is_string, ipv6_leaf).into_ref(),
        Node::leaf("mac", is_string, mac).aliases(&["macaddress"]).into_ref(),
        Node::leaf("uuid", is_string, uuid_leaf).aliases(&["guid"]).into_ref(),
        Node::leaf("id", any, id).aliases(&["identifier"]).into_ref(),
        Node::leaf("key", is_string, key)
            .aliases(&["apikey", "token", "accesstoken", "refreshtoken", "secret", "clientsecret"])
            .into_ref(),
        Node::leaf("hash", is_string, hash)
            .aliases(&["checksum", "digest", "sha256", "sha1", "md5"])
            .into_ref(),
        Node::leaf("error", is_string, error).aliases(&["errormessage", "err"]).into_ref(),
        Node::leaf("useragent", is_string, user_agent).into_ref(),
    ]
}

/// Lower-case ASCII letters of `s`.
fn slug(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).flat_map(|c| c.to_lowercase()).collect()
}

pub fn email(session: &mut Session<'_>, first: Option<&str>, last: Option<&str>) -> String {
    let domain = pick(session, EMAIL_DOMAINS);
    let local = match (first, last) {
        (Some(f), Some(l)) => format!("{}.{}", slug(f), slug(l)),
        (Some(f), None) => format!("{}{}", slug(f), session.rng.int_range(1, 99)),
        (None, Some(l)) => format!("{}{}", slug(l), session.rng.int_range(1, 99)),
        (None, None) => format!("{}{}", pick(session, NOUNS), session.rng.int_range(1, 999)),
    };
    format!("{}@{}", local, domain)
}

pub fn uuid(session: &mut Session<'_>) -> String {
    uuid::Builder::from_random_bytes(session.rng.bytes()).into_uuid().to_string()
}

pub fn domain(session: &mut Session<'_>) -> String {
    let word = pick(session, NOUNS);
    let tld = pick(session, TLDS);
    format!("{}{}.{}", word, pick(session, &["", "hub", "ly", "works", "base"]), tld)
}

pub fn url(session: &mut Session<'_>) -> String {
    let host = domain(session);
    let path = pick(session, NOUNS);
    format!("https://www.{}/{}", host, path)
}

pub fn ipv4(session: &mut Session<'_>) -> String {
    let octets: Vec<String> = (0..4).map(|_| session.rng.int_range(1, 254).to_string()).collect();
    octets.join(".")
}

pub fn ipv6(session: &mut Session<'_>) -> String {
    let groups: Vec<String> = (0..8).map(|_| format!("{:x}", session.rng.int_range(0, 0xffff))).collect();
    groups.join(":")
}

fn names(session: &Session<'_>) -> (Option<String>, Option<String>) {
    (
        session.context.get_str("firstname").map(str::to_string),
        session.context.get_str("lastname").map(str::to_string),
    )
}

fn email_leaf(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let (first, last) = names(session);
    text(email(session, first.as_deref(), last.as_deref()))
}

fn username(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let (first, last) = names(session);
    let n = session.rng.int_range(1, 99);
    let name = match (first, last) {
        (Some(f), Some(l)) => {
            let initial: String = f.chars().take(1).collect();
            format!("{}{}{}", slug(&initial), slug(&l), n)
        }
        (Some(f), None) => format!("{}{}", slug(&f), n),
        _ => format!("{}{}", pick(session, NOUNS), n),
    };
    text(name)
}

fn password(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    let schema = request.schema();
    let min = schema.min_length.unwrap_or(12);
    let max = schema.max_length.unwrap_or(min.max(16));
    let len = session.rng.usize_range(min.min(max), max);
    text(random_from(session, &format!("{}!#$%&*+-?@", ALNUM), len))
}

fn url_leaf(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(url(session))
}

fn domain_leaf(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(domain(session))
}

fn ipv4_leaf(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    if request.schema().format.as_deref() == Some("ipv6") {
        return text(ipv6(session));
    }
    text(ipv4(session))
}

fn ipv6_leaf(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(ipv6(session))
}

fn mac(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    let bytes: [u8; 6] = session.rng.bytes();
    let parts: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    text(parts.join(":"))
}

fn uuid_leaf(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(uuid(session))
}

/// Integer ids for numeric schemas, UUIDs for unformatted strings.
fn id(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    if is_integer(request) {
        return integer_in(session, request, 1, 100_000);
    }
    match wanted(request) {
        Some(SchemaType::String) | None => {}
        _ => return Err(FakeError::NotSupported),
    }
    let schema = request.schema();
    if schema.format.is_some() || schema.pattern.is_some() {
        return Err(FakeError::NotSupported);
    }
    match schema.max_length {
        Some(max) if max < 36 => {
            let len = session.rng.usize_range(schema.min_length.unwrap_or(1).max(1).min(max), max);
            text(random_from(session, ALNUM, len))
        }
        _ => text(uuid(session)),
    }
}

fn key(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(random_from(session, ALNUM, 32))
}

fn hash(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    let bytes: [u8; 32] = session.rng.bytes();
    let hex = format!("{:x}", Sha256::digest(bytes));
    let len = match request.last_name().as_str() {
        "md5" => 32,
        "sha1" => 40,
        _ => match request.schema().max_length {
            Some(max) if max < hex.len() => max,
            _ => hex.len(),
        },
    };
    text(hex[..len].to_string())
}

fn error(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, ERRORS))
}

fn user_agent(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, USER_AGENTS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_drops_non_ascii_and_case() {
        assert_eq!(slug("Mary-Ann"), "maryann");
        assert_eq!(slug("O'Neil"), "oneil");
    }
}
