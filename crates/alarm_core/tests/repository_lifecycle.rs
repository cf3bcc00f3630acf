use alarm_core::{
    AlarmRepository, AlarmStorage, Alarmtone, RetryPolicy, SqliteAlarmStorage, ToneChange,
    ToneChangeOrigin,
};
use std::thread;

fn open_file_repo(path: &std::path::Path) -> AlarmRepository {
    AlarmRepository::open(SqliteAlarmStorage::open(path).unwrap(), RetryPolicy::default()).unwrap()
}

#[test]
fn create_issues_monotonic_ids_in_creation_order() {
    let repo = AlarmRepository::in_memory().unwrap();
    let first = repo.create();
    let second = repo.create();
    let third = repo.create();

    assert_eq!((first.id(), second.id(), third.id()), (1, 2, 3));
    let ids: Vec<i64> = repo.query().iter().map(|store| store.id()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(first.read().id, 1);
}

#[test]
fn deleted_ids_are_never_reused() {
    let repo = AlarmRepository::in_memory().unwrap();
    let first = repo.create();
    let second = repo.create();

    second.delete();
    let third = repo.create();

    assert_eq!(third.id(), 3);
    let ids: Vec<i64> = repo.query().iter().map(|store| store.id()).collect();
    assert_eq!(ids, vec![first.id(), third.id()]);
}

#[test]
fn delete_removes_handle_and_ignores_later_modify() {
    let repo = AlarmRepository::in_memory().unwrap();
    let store = repo.create();
    let id = store.id();

    store.delete();
    store.delete();
    store.modify(|alarm| {
        let mut next = alarm.clone();
        next.label = "ghost".to_string();
        next
    });

    assert!(store.is_deleted());
    assert!(!repo.contains(id));
    assert!(repo.get(id).is_none());
    assert!(repo.is_empty());
    assert_eq!(store.read().label, "");
    repo.await_stored().unwrap();
}

#[test]
fn modify_replaces_value_and_keeps_identity() {
    let repo = AlarmRepository::in_memory().unwrap();
    let store = repo.create();

    store.modify(|alarm| {
        let mut next = alarm.clone();
        next.id = 99;
        next.hour = 5;
        next
    });

    let value = store.read();
    assert_eq!(value.id, store.id());
    assert_eq!(value.hour, 5);
}

#[test]
fn await_stored_makes_all_prior_writes_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alarms.db");
    let repo = open_file_repo(&path);

    let kept = repo.create();
    let dropped = repo.create();
    kept.modify(|alarm| {
        let mut next = alarm.clone();
        next.is_enabled = true;
        next.label = "durable".to_string();
        next
    });
    dropped.delete();
    repo.await_stored().unwrap();

    let persisted = SqliteAlarmStorage::open(&path).unwrap().load_all().unwrap();
    assert_eq!(persisted, vec![kept.read()]);
}

#[test]
fn reopen_loads_alarms_and_continues_id_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alarms.db");
    {
        let repo = open_file_repo(&path);
        repo.create();
        let second = repo.create();
        second.modify(|alarm| {
            let mut next = alarm.clone();
            next.minute = 15;
            next
        });
        repo.await_stored().unwrap();
    }

    let repo = open_file_repo(&path);
    let loaded = repo.query();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[1].read().minute, 15);
    assert_eq!(repo.create().id(), 3);
}

#[test]
fn observers_each_receive_every_update_once_in_the_same_order() {
    let repo = AlarmRepository::in_memory().unwrap();
    let store = repo.create();
    let first = store.observe();
    let second = store.observe();

    for hour in [9, 10, 11] {
        store.modify(|alarm| {
            let mut next = alarm.clone();
            next.hour = hour;
            next
        });
    }

    let seen_first: Vec<u8> = first.drain().into_iter().map(|alarm| alarm.hour).collect();
    let seen_second: Vec<u8> = second.drain().into_iter().map(|alarm| alarm.hour).collect();
    assert_eq!(seen_first, vec![8, 9, 10, 11]);
    assert_eq!(seen_first, seen_second);
}

#[test]
fn repository_observe_follows_creates_and_deletes() {
    let repo = AlarmRepository::in_memory().unwrap();
    let lists = repo.observe();

    let store = repo.create();
    store.delete();

    let sizes: Vec<usize> = lists.drain().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![0, 1, 0]);
}

#[test]
fn tone_changes_are_published_for_create_and_tone_edits_only() {
    let repo = AlarmRepository::in_memory().unwrap();
    let tones = repo.tone_changes();

    let store = repo.create();
    store.modify(|alarm| {
        let mut next = alarm.clone();
        next.label = "no tone change".to_string();
        next
    });
    store.modify(|alarm| {
        let mut next = alarm.clone();
        next.alarmtone = Alarmtone::Sound("content://tones/1".to_string());
        next
    });

    assert_eq!(
        tones.drain(),
        vec![
            ToneChange {
                alarm_id: store.id(),
                alarmtone: Alarmtone::Default,
                origin: ToneChangeOrigin::Created,
            },
            ToneChange {
                alarm_id: store.id(),
                alarmtone: Alarmtone::Sound("content://tones/1".to_string()),
                origin: ToneChangeOrigin::Stored,
            },
        ]
    );
}

#[test]
fn handles_are_mutated_concurrently_without_cross_talk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alarms.db");
    let repo = open_file_repo(&path);
    let stores: Vec<_> = (0..4).map(|_| repo.create()).collect();

    let workers: Vec<_> = stores
        .iter()
        .cloned()
        .map(|store| {
            thread::spawn(move || {
                for minute in 0..30 {
                    store.modify(|alarm| {
                        let mut next = alarm.clone();
                        next.minute = minute;
                        next
                    });
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    repo.await_stored().unwrap();

    let persisted = SqliteAlarmStorage::open(&path).unwrap().load_all().unwrap();
    assert_eq!(persisted.len(), 4);
    assert!(persisted.iter().all(|alarm| alarm.minute == 29));
    assert!(stores.iter().all(|store| store.read().minute == 29));
}

#[test]
fn concurrent_creators_keep_query_in_id_order() {
    for _ in 0..50 {
        let repo = AlarmRepository::in_memory().unwrap();
        let creators: Vec<_> = (0..8)
            .map(|_| {
                let repo = repo.clone();
                thread::spawn(move || {
                    for _ in 0..20 {
                        repo.create();
                    }
                })
            })
            .collect();
        for creator in creators {
            creator.join().unwrap();
        }

        let ids: Vec<i64> = repo.query().iter().map(|store| store.id()).collect();
        assert_eq!(ids, (1..=160).collect::<Vec<_>>());
    }
}

#[test]
fn default_tone_change_reaches_alarms_using_the_default() {
    let repo = AlarmRepository::in_memory().unwrap();
    let uses_default = repo.create();
    let silent = repo.create();
    silent.modify(|alarm| {
        let mut next = alarm.clone();
        next.alarmtone = Alarmtone::Silent;
        next
    });
    let tones = repo.tone_changes();

    let new_default = Alarmtone::Sound("content://tones/default".to_string());
    assert_eq!(repo.publish_default_tone_change(&new_default), 1);

    assert_eq!(
        tones.drain(),
        vec![ToneChange {
            alarm_id: uses_default.id(),
            alarmtone: new_default,
            origin: ToneChangeOrigin::DefaultTone,
        }]
    );
    assert_eq!(uses_default.read().alarmtone, Alarmtone::Default);
}
