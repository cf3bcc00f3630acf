use alarm_core::{AlarmContext, AlarmStorage, CoreConfig, SqliteAlarmStorage};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn in_memory_context_shares_repository_with_session() {
    let context = AlarmContext::open(&CoreConfig::default()).unwrap();
    assert!(context.repository().is_empty());

    let id = context.session().create_new_alarm();
    assert!(context.repository().contains(id));
    context.on_hidden().unwrap();
}

#[test]
fn committed_edit_survives_context_reopen() {
    let dir = TempDir::new().unwrap();
    let config = CoreConfig::with_db_path(dir.path().join("alarms.sqlite3"));

    let id = {
        let context = AlarmContext::open(&config).unwrap();
        let session = Arc::clone(context.session());
        let id = session.create_new_alarm();
        session.modify_overlay(|alarm| {
            let mut next = alarm.clone();
            next.hour = 6;
            next.minute = 45;
            next.is_enabled = true;
            next
        });
        session.commit();
        context.on_hidden().unwrap();
        id
    };

    let reopened = AlarmContext::open(&config).unwrap();
    let store = reopened.repository().get(id).unwrap();
    let alarm = store.read();
    assert_eq!((alarm.hour, alarm.minute), (6, 45));
    assert!(alarm.is_enabled);
    assert!(alarm.is_delete_after_dismiss);

    let next = reopened.repository().create();
    assert!(next.id() > id);
}

#[test]
fn cancelled_new_alarm_is_gone_from_storage() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("alarms.sqlite3");
    let config = CoreConfig::with_db_path(&db_path);

    {
        let context = AlarmContext::open(&config).unwrap();
        context.session().create_new_alarm();
        context.session().cancel();
        context.on_hidden().unwrap();
    }

    let storage = SqliteAlarmStorage::open(&db_path).unwrap();
    assert!(storage.load_all().unwrap().is_empty());
}
