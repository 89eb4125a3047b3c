//! Tests for the modules scripts import: faker, http, kafka, smtp,
//! encoding and the helpers on `mokapi`.

extern crate mokapi_engine;

use std::collections::BTreeMap;
use std::fs;
use std::sync::{Arc, Mutex};

use mokapi_engine::config::{GeneratorConfig, RuntimeConfig};
use mokapi_engine::host::{
    DefaultHost, HostError, HttpClient, HttpRequest, HttpResponse, InMemoryKafka, Mail, MailSender,
};
use mokapi_engine::runtime::ScriptRuntime;
use serde_json::json;

#[derive(Default)]
struct Recorder {
    requests: Mutex<Vec<HttpRequest>>,
}

impl HttpClient for Recorder {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, HostError> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        if url.contains("offline") {
            return Err(HostError::Http {
                url,
                message: "connection refused".to_string(),
            });
        }
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), vec!["application/json".to_string()]);
        Ok(HttpResponse {
            status: 200,
            headers,
            body: br#"{"id":1,"name":"Rex"}"#.to_vec(),
        })
    }
}

#[derive(Default)]
struct Outbox(Mutex<Vec<Mail>>);

impl MailSender for Outbox {
    fn send(&self, mail: Mail) -> Result<(), HostError> {
        self.0.lock().unwrap().push(mail);
        Ok(())
    }
}

fn runtime_with(host: DefaultHost, config: &RuntimeConfig) -> ScriptRuntime {
    ScriptRuntime::new(config, Arc::new(host)).unwrap()
}

fn plain(name: &str) -> ScriptRuntime {
    let config = RuntimeConfig::default().with_script_name(name);
    runtime_with(DefaultHost::new(&config).unwrap(), &config)
}

// ============================================================================
// Faker
// ============================================================================

mod faker_tests {
    use super::*;

    #[test]
    fn test_fake_from_script() {
        let runtime = plain("faker.js");
        let value = runtime
            .run_source(
                "faker.js",
                "import { fake } from 'mokapi/faker'\n\
                 export default function () { return fake({ type: 'string', enum: ['a', 'b'] }) }",
            )
            .unwrap();
        assert!(value == json!("a") || value == json!("b"), "{}", value);
    }

    #[test]
    fn test_seeded_runtimes_agree() {
        let schema = "import { fake } from 'faker'\n\
                      export default function () { return fake({ type: 'array', items: { type: 'integer' }, minItems: 3, maxItems: 3 }) }";
        let run = || {
            let mut config = RuntimeConfig::default().with_script_name("seeded.js");
            config.generator = GeneratorConfig::default().with_seed(77);
            runtime_with(DefaultHost::new(&config).unwrap(), &config)
                .run_source("seeded.js", schema)
                .unwrap()
        };
        let first = run();
        assert_eq!(first.as_array().map(Vec::len), Some(3));
        assert_eq!(first, run());
    }

    #[test]
    fn test_find_by_name() {
        let runtime = plain("nodes.js");
        let value = runtime
            .run_source(
                "nodes.js",
                "import { findByName } from 'mokapi/faker'\n\
                 export default function () { return findByName('firstname').name }",
            )
            .unwrap();
        assert_eq!(value, json!("firstname"));
    }

    #[test]
    fn test_fake_rejects_non_object_schema() {
        let runtime = plain("bad.js");
        let err = runtime
            .run_source(
                "bad.js",
                "import { fake } from 'mokapi/faker'\nexport default function () { return fake('string') }",
            )
            .unwrap_err();
        assert!(err.to_string().contains("unexpected type for 'schema'"), "{}", err);
    }
}

// ============================================================================
// HTTP
// ============================================================================

mod http_tests {
    use super::*;

    fn setup() -> (ScriptRuntime, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let config = RuntimeConfig::default().with_script_name("client.js");
        let host = DefaultHost::new(&config).unwrap().with_http_client(recorder.clone());
        (runtime_with(host, &config), recorder)
    }

    #[test]
    fn test_post_with_json_body() {
        let (runtime, recorder) = setup();
        let value = runtime
            .run_source(
                "client.js",
                "import { post } from 'mokapi/http'\n\
                 export default function () {\n\
                     const res = post('http://api/pets', { name: 'Rex' }, { headers: { 'X-Trace': 'abc' } })\n\
                     return [res.status, res.json().name]\n\
                 }",
            )
            .unwrap();
        assert_eq!(value, json!([200, "Rex"]));
        let requests = recorder.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].url, "http://api/pets");
        assert!(requests[0].has_header("X-Trace"));
    }

    #[test]
    fn test_fetch_returns_a_promise() {
        let (runtime, recorder) = setup();
        let value = runtime
            .run_source(
                "client.js",
                "export default async function () {\n\
                     const res = await fetch('http://api/pets/1', { method: 'PUT', body: 'x' })\n\
                     const body = await res.json()\n\
                     return { ok: res.ok, id: body.id }\n\
                 }",
            )
            .unwrap();
        assert_eq!(value, json!({"ok": true, "id": 1}));
        assert_eq!(recorder.requests.lock().unwrap()[0].method, "PUT");
    }

    #[test]
    fn test_transport_errors_are_thrown() {
        let (runtime, _recorder) = setup();
        let err = runtime
            .run_source(
                "client.js",
                "import { get } from 'http'\nexport default function () { return get('http://offline/') }",
            )
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"), "{}", err);
    }
}

// ============================================================================
// Kafka and mail
// ============================================================================

mod messaging_tests {
    use super::*;

    #[test]
    fn test_produce_appends_records() {
        let kafka = Arc::new(InMemoryKafka::new("local"));
        let config = RuntimeConfig::default().with_script_name("producer.js");
        let host = DefaultHost::new(&config).unwrap().with_kafka_client(kafka.clone());
        let value = runtime_with(host, &config)
            .run_source(
                "producer.js",
                "import { produce } from 'mokapi/kafka'\n\
                 export default function () {\n\
                     produce({ topic: 'orders', messages: [{ key: 'a', value: { n: 1 } }] })\n\
                     const r = produce({ topic: 'orders', messages: [{ key: 'b', value: { n: 2 } }] })\n\
                     return r.messages[0].offset\n\
                 }",
            )
            .unwrap();
        assert_eq!(value, json!(1));
        let records = kafka.records("orders");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].value, Some(json!({"n": 2})));
    }

    #[test]
    fn test_kafka_without_client_fails() {
        let err = plain("producer.js")
            .run_source(
                "producer.js",
                "import { produce } from 'kafka'\nexport default function () { produce({ topic: 't', messages: [] }) }",
            )
            .unwrap_err();
        assert!(err.to_string().starts_with("Error: "), "{}", err);
    }

    #[test]
    fn test_send_mail() {
        let outbox = Arc::new(Outbox::default());
        let config = RuntimeConfig::default().with_script_name("mail.js");
        let host = DefaultHost::new(&config).unwrap().with_mail_sender(outbox.clone());
        runtime_with(host, &config)
            .run_source(
                "mail.js",
                "import { send } from 'mokapi/smtp'\n\
                 export default function () {\n\
                     send('smtp://localhost:25', { from: 'a@example.com', to: ['b@example.com'], subject: 'hi' })\n\
                 }",
            )
            .unwrap();
        let sent = outbox.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "smtp://localhost:25");
        assert_eq!(sent[0].message["subject"], json!("hi"));
        assert!(sent[0].auth.is_none());
    }
}

// ============================================================================
// Helpers on mokapi, encoding and open
// ============================================================================

mod helper_tests {
    use super::*;

    #[test]
    fn test_base64() {
        let value = plain("enc.js")
            .run_source(
                "enc.js",
                "import { base64 } from 'mokapi/encoding'\n\
                 export default function () { const e = base64.encode('hello world'); return [e, base64.decode(e)] }",
            )
            .unwrap();
        assert_eq!(value, json!(["aGVsbG8gd29ybGQ=", "hello world"]));
    }

    #[test]
    fn test_marshal_to_json() {
        let value = plain("marshal.js")
            .run_source(
                "marshal.js",
                "import { marshal } from 'mokapi'\n\
                 export default function () { return marshal({ a: 1, b: [true] }) }",
            )
            .unwrap();
        assert_eq!(value, json!(r#"{"a":1,"b":[true]}"#));
    }

    #[test]
    fn test_date_with_layout() {
        let value = plain("date.js")
            .run_source(
                "date.js",
                "import { date } from 'mokapi'\n\
                 export default function () { return date({ timestamp: 86400000, layout: '2006-01-02' }) }",
            )
            .unwrap();
        assert_eq!(value, json!("1970-01-02"));
    }

    #[test]
    fn test_missing_env_is_empty() {
        let value = plain("env.js")
            .run_source(
                "env.js",
                "import { env } from 'mokapi'\n\
                 export default function () { return env('MOKAPI_TEST_SURELY_UNSET_VARIABLE') }",
            )
            .unwrap();
        assert_eq!(value, json!(""));
    }

    #[test]
    fn test_open_relative_to_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pets.txt"), "Rex").unwrap();
        let config = RuntimeConfig::default()
            .with_script_name("open.js")
            .with_working_dir(dir.path());
        let value = runtime_with(DefaultHost::new(&config).unwrap(), &config)
            .run_source(
                "open.js",
                "export default function () { return [open('pets.txt'), open('pets.txt', { as: 'binary' })] }",
            )
            .unwrap();
        assert_eq!(value, json!(["Rex", [82, 101, 120]]));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig::default()
            .with_script_name("open.js")
            .with_working_dir(dir.path());
        let result = runtime_with(DefaultHost::new(&config).unwrap(), &config)
            .run_source("open.js", "export default function () { return open('missing.txt') }");
        assert!(result.is_err());
    }
}
