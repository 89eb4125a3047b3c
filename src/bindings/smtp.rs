//! The `mokapi/smtp` module: `send(url, message, auth)` through the host.

use crate::host::Mail;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::arg;

use super::{expect_options, function, host, host_error, is_plain_object, object, to_json, type_error};

pub(crate) fn exports(_ctx: &mut EvalContext) -> ValueResult {
    Ok(object(vec![("send", function("send", send))]))
}

fn send(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let url = match arg(&args, 0) {
        JsValue::String(s) => s,
        other => return Err(type_error("url", &other, "String")),
    };
    let message = arg(&args, 1);
    if !is_plain_object(&message) {
        return Err(type_error("message", &message, "Object"));
    }
    let auth = arg(&args, 2);
    expect_options("auth", &auth)?;
    let mail = Mail {
        url,
        message: to_json(&message)?,
        auth: if auth.is_nullish() { None } else { Some(to_json(&auth)?) },
    };
    log::debug!("sending mail via {}", mail.url);
    host(ctx)?.send_mail(mail).map_err(host_error)?;
    Ok(JsValue::Undefined)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::bindings::HostBinding;
    use crate::config::RuntimeConfig;
    use crate::host::{DefaultHost, Host, HostError, MailSender};
    use crate::runner::ds::json::json_to_js;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<Mail>>);

    impl MailSender for Outbox {
        fn send(&self, mail: Mail) -> Result<(), HostError> {
            self.0.lock().unwrap().push(mail);
            Ok(())
        }
    }

    fn context(host: DefaultHost) -> EvalContext {
        let host: Arc<dyn Host> = Arc::new(host);
        let mut ctx = EvalContext::with_core_builtins();
        ctx.set_extension(Rc::new(HostBinding {
            host,
            base_dir: std::env::temp_dir(),
        }));
        ctx
    }

    #[test]
    fn delegates_to_host() {
        let outbox = Arc::new(Outbox::default());
        let host = DefaultHost::new(&RuntimeConfig::default()).unwrap().with_mail_sender(outbox.clone());
        let mut ctx = context(host);
        let message = json_to_js(&serde_json::json!({"from": "a@x", "to": ["b@x"], "subject": "hi"}));
        send(&mut ctx, JsValue::Undefined, vec![JsValue::str("smtp://localhost:25"), message]).unwrap();
        let sent = outbox.0.lock().unwrap();
        assert_eq!(sent[0].url, "smtp://localhost:25");
        assert_eq!(sent[0].message["subject"], "hi");
        assert!(sent[0].auth.is_none());
    }

    #[test]
    fn unsupported_without_sender() {
        let mut ctx = context(DefaultHost::new(&RuntimeConfig::default()).unwrap());
        let message = json_to_js(&serde_json::json!({}));
        let err = send(&mut ctx, JsValue::Undefined, vec![JsValue::str("smtp://x"), message]).unwrap_err();
        assert_eq!(err.get_message(), "Error: smtp is not supported by this host");
    }
}
