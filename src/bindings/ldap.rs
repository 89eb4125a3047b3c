//! The `mokapi/ldap` module: constant bundles for LDAP event handlers.

use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;

use super::object;

const SEARCH_SCOPE: &[(&str, i64)] = &[("BaseObject", 0), ("SingleLevel", 1), ("WholeSubtree", 2)];

/// RFC 4511 result codes.
const RESULT_CODE: &[(&str, i64)] = &[
    ("Success", 0),
    ("OperationsError", 1),
    ("ProtocolError", 2),
    ("TimeLimitExceeded", 3),
    ("SizeLimitExceeded", 4),
    ("CompareFalse", 5),
    ("CompareTrue", 6),
    ("AuthMethodNotSupported", 7),
    ("StrongerAuthRequired", 8),
    ("NoSuchAttribute", 16),
    ("UndefinedAttributeType", 17),
    ("InappropriateMatching", 18),
    ("ConstraintViolation", 19),
    ("AttributeOrValueExists", 20),
    ("InvalidAttributeSyntax", 21),
    ("NoSuchObject", 32),
    ("InvalidDNSyntax", 34),
    ("InvalidCredentials", 49),
    ("InsufficientAccessRights", 50),
    ("Busy", 51),
    ("Unavailable", 52),
    ("UnwillingToPerform", 53),
    ("NamingViolation", 64),
    ("ObjectClassViolation", 65),
    ("NotAllowedOnNonLeaf", 66),
    ("EntryAlreadyExists", 68),
    ("Other", 80),
];

fn bundle(entries: &[(&'static str, i64)]) -> JsValue {
    object(entries.iter().map(|(name, code)| (*name, JsValue::from_i64(*code))).collect())
}

pub(crate) fn exports(_ctx: &mut EvalContext) -> ValueResult {
    Ok(object(vec![
        ("SearchScope", bundle(SEARCH_SCOPE)),
        ("ResultCode", bundle(RESULT_CODE)),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::eval::property::get_property;

    #[test]
    fn constants() {
        let mut ctx = EvalContext::new();
        let module = exports(&mut ctx).unwrap();
        let scope = get_property(&mut ctx, &module, "SearchScope").unwrap();
        assert_eq!(get_property(&mut ctx, &scope, "WholeSubtree").unwrap(), JsValue::from_i64(2));
        let codes = get_property(&mut ctx, &module, "ResultCode").unwrap();
        assert_eq!(get_property(&mut ctx, &codes, "InvalidCredentials").unwrap(), JsValue::from_i64(49));
    }
}
