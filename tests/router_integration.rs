//! 输出路由器集成测试
//!
//! 通过公开接口验证分发顺序、整体开关、失败策略以及数据库表会话。

use chrono::{DateTime, Local};
use fanlog::sinks::table::fields;
use fanlog::{
    get_diagnostics, load_config_from_str, FailurePolicy, FanlogError, FieldValue, FileConfig,
    LogOwner, MemoryDatabase, Output, OutputConfig, OutputRouter, OwnerLink, SinkKind,
    SmtpConfig, TableConfig, TableOptions,
};
use std::fs;
use std::io::{self, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// 按调用顺序记录事件
#[derive(Clone, Default)]
struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// 把控制台写入记录到 `CallLog` 的输出目标
struct ConsoleProbe(CallLog);

impl Write for ConsoleProbe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf).into_owned();
        self.0 .0.lock().unwrap().push(format!("console:{}", text));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct TestLogger {
    name: String,
    started: DateTime<Local>,
    warnings: Mutex<Vec<String>>,
}

impl TestLogger {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            started: Local::now(),
            warnings: Mutex::new(Vec::new()),
        })
    }

    fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }
}

impl LogOwner for TestLogger {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn start_date(&self) -> DateTime<Local> {
        self.started
    }

    fn header(&self) -> String {
        format!("{} started at {}", self.name, self.started)
    }

    fn warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}

fn file_config(dir: &Path) -> FileConfig {
    FileConfig::default().directory(dir).filename("{owner}")
}

fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn console_receives_text_before_file_failure() {
    let temp = tempfile::tempdir().unwrap();
    let blocker = temp.path().join("blocker");
    fs::write(&blocker, b"regular file").unwrap();

    let logger = TestLogger::new("svc");
    let config = OutputConfig {
        path: file_config(&blocker.join("logs")),
        ..Default::default()
    };
    let mut router = OutputRouter::new(OwnerLink::new(&logger), &config).unwrap();
    let calls = CallLog::default();
    router
        .console_mut()
        .set_writer(Box::new(ConsoleProbe(calls.clone())));

    let result = router.write("INFO\tready\n");

    assert!(matches!(result, Err(FanlogError::IoError { .. })));
    assert_eq!(calls.events(), vec!["console:INFO\tready\n".to_string()]);
}

#[test]
fn fan_out_writes_same_text_to_console_and_file() {
    let temp = tempfile::tempdir().unwrap();
    let logger = TestLogger::new("svc");
    let config = OutputConfig {
        path: file_config(temp.path()),
        ..Default::default()
    };
    let mut router = OutputRouter::new(OwnerLink::new(&logger), &config).unwrap();
    let calls = CallLog::default();
    router
        .console_mut()
        .set_writer(Box::new(ConsoleProbe(calls.clone())));

    router.write("one\n").unwrap();
    router.write(&String::from("two\n")).unwrap();

    assert_eq!(
        calls.events(),
        vec!["console:one\n".to_string(), "console:two\n".to_string()]
    );
    let path = temp.path().join("svc.log");
    assert_eq!(router.file().path(), path);
    assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    assert_eq!(router.file().size(), Some(8));
}

#[test]
fn disabled_router_has_no_side_effects() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("logs");
    let logger = TestLogger::new("svc");
    let config = OutputConfig {
        enabled: false,
        path: file_config(&dir),
        ..Default::default()
    };
    let mut router = OutputRouter::new(OwnerLink::new(&logger), &config).unwrap();
    let calls = CallLog::default();
    router
        .console_mut()
        .set_writer(Box::new(ConsoleProbe(calls.clone())));

    router.write("hidden\n").unwrap();
    router.alarm(true).unwrap();
    router.new_session().unwrap();

    assert!(calls.events().is_empty());
    assert!(!dir.exists());

    router.open();
    router.write("shown\n").unwrap();
    assert_eq!(calls.events().len(), 1);
    assert!(dir.join("svc.log").is_file());
}

#[test]
fn unreachable_smtp_disables_email_and_warns_owner() {
    let temp = tempfile::tempdir().unwrap();
    let logger = TestLogger::new("svc");
    let config = OutputConfig {
        console: false,
        email: true,
        path: file_config(temp.path()),
        smtp: SmtpConfig::default().host("127.0.0.1").port(closed_port()),
        ..Default::default()
    };
    let disabled_before = get_diagnostics().sinks_disabled;

    let router = OutputRouter::new(OwnerLink::new(&logger), &config).unwrap();

    assert!(!router.email().status());
    assert_eq!(router.enabled_sinks(), vec![SinkKind::File]);
    assert_eq!(logger.warnings().len(), 1);
    assert!(get_diagnostics().sinks_disabled > disabled_before);
}

#[test]
fn strict_policy_surfaces_smtp_failure() {
    let temp = tempfile::tempdir().unwrap();
    let logger = TestLogger::new("svc");
    let config = OutputConfig {
        email: true,
        failure_policy: FailurePolicy::Strict,
        path: file_config(temp.path()),
        smtp: SmtpConfig::default().host("127.0.0.1").port(closed_port()),
        ..Default::default()
    };

    let result = OutputRouter::new(OwnerLink::new(&logger), &config);

    assert!(result.is_err());
    assert!(logger.warnings().is_empty());
}

#[test]
fn table_session_through_router() {
    let temp = tempfile::tempdir().unwrap();
    let logger = TestLogger::new("svc");
    let config = OutputConfig {
        console: false,
        table: true,
        path: file_config(temp.path()),
        ..Default::default()
    };
    let mut router = OutputRouter::new(OwnerLink::new(&logger), &config).unwrap();

    let db = MemoryDatabase::new();
    db.create_table("runs", &["id"]).unwrap();
    router
        .table_mut()
        .configure(
            TableOptions::new(TableConfig::default().name("runs").date_column("updated"))
                .database(Arc::new(db.clone())),
        )
        .unwrap();

    router.write_fields(fields([("a", 1)])).unwrap();
    router.write_fields(fields([("a", 2)])).unwrap();
    assert_eq!(db.rows("runs").unwrap().len(), 1);
    assert_eq!(router.table().primary_key(), Some(&FieldValue::Integer(1)));

    router.new_session().unwrap();
    router.write_fields(fields([("a", 3)])).unwrap();

    let rows = db.rows("runs").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["a"], FieldValue::Integer(2));
    assert_eq!(rows[1]["a"], FieldValue::Integer(3));
    assert!(matches!(rows[1]["updated"], FieldValue::Timestamp(_)));
}

#[test]
fn router_from_toml_configuration() {
    let temp = tempfile::tempdir().unwrap();
    let toml = format!(
        r#"
        console = false
        html = true

        [path]
        directory = "{}"
        filename = "{{owner}}-{{datetime:%Y}}"
        extension = "txt"
        "#,
        temp.path().display()
    );
    let config = load_config_from_str(&toml).unwrap();
    let logger = TestLogger::new("svc");
    let mut router = OutputRouter::new(OwnerLink::new(&logger), &config).unwrap();

    router.write("line\n").unwrap();

    let expected = temp
        .path()
        .join(format!("svc-{}.txt", logger.started.format("%Y")));
    assert_eq!(router.file().path(), expected);
    assert!(expected.is_file());
    assert_eq!(
        router.enabled_sinks(),
        vec![SinkKind::File, SinkKind::Html]
    );
}
