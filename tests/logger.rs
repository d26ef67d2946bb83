use fieldnote::config::LoggingConfig;
use fieldnote::logger::Logger;
use log::{Level, LevelFilter, Record};

fn emit(log: &dyn log::Log, level: Level, target: &str, message: &str) {
    log.log(
        &Record::builder()
            .args(format_args!("{message}"))
            .level(level)
            .target(target)
            .build(),
    );
}

#[test]
fn test_config_based_logging_disabled() {
    let config = LoggingConfig {
        enabled: false,
        ..LoggingConfig::default()
    };
    let logger = Logger::from_config(&config).unwrap();
    assert!(!logger.is_enabled());
    assert!(logger.log_file().is_none());

    // Direct entries still reach the ring
    logger.log("Test message".to_string());
    let logs = logger.recent_logs();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].contains("Test message"));
}

#[test]
fn test_config_based_logging_enabled() {
    let logger = Logger::from_config(&LoggingConfig::default()).unwrap();
    assert!(logger.is_enabled());
    assert_eq!(logger.level(), LevelFilter::Info);
    assert!(logger.log_file().is_some());
}

#[test]
fn test_dispatch_fills_ring_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("fieldnote.log");
    let logger = Logger::new().with_log_file(&path);

    let (level, log) = logger.dispatch().unwrap().into_log();
    assert_eq!(level, LevelFilter::Info);

    emit(log.as_ref(), Level::Info, "fieldnote::sync", "pushed 3 items");
    emit(log.as_ref(), Level::Debug, "fieldnote::sync", "below the level");
    emit(log.as_ref(), Level::Info, "sqlx::query", "SELECT 1");
    emit(log.as_ref(), Level::Warn, "fieldnote::sync", "pull failed");
    log.flush();

    let logs = logger.recent_logs();
    assert_eq!(logs, vec!["pull failed".to_string(), "pushed 3 items".to_string()]);

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("INFO  fieldnote::sync] pushed 3 items"));
    assert!(content.contains("pull failed"));
    assert!(!content.contains("SELECT 1"));
}

#[test]
fn test_ring_is_bounded_and_clearable() {
    let logger = Logger::new();
    for i in 0..600 {
        logger.log(format!("line {i}"));
    }
    let logs = logger.recent_logs();
    assert_eq!(logs.len(), 500);
    assert!(logs[0].ends_with("line 599"));
    assert!(logs[499].ends_with("line 100"));

    logger.clear();
    assert!(logger.recent_logs().is_empty());
}
