use sqlmodel_plus_core::{Engine, Params, Value, params};
use sqlmodel_plus_macros::Model;
use sqlmodel_plus_query::{Expr, OrderBy, Select, text};
use sqlmodel_plus_schema::{CreateOptions, create_table};
use sqlmodel_plus_session::Session;
use sqlmodel_plus_sqlite::create_engine;

#[derive(Model, Debug, Clone, PartialEq)]
struct Hero {
    id: Option<i64>,
    #[sqlmodel(unique)]
    name: String,
    age: Option<i32>,
    #[sqlmodel(default = "'rookie'")]
    rank: Option<String>,
}

fn hero(name: &str) -> Hero {
    Hero {
        id: None,
        name: name.into(),
        age: None,
        rank: None,
    }
}

fn setup() -> Engine {
    let engine = create_engine("sqlite://").unwrap();
    create_table::<Hero>(&engine, &CreateOptions::default()).unwrap();
    engine
}

fn count_heroes(engine: &Engine) -> i64 {
    let rows = engine
        .query("SELECT COUNT(*) FROM hero", &Params::new())
        .unwrap();
    rows[0].get_as::<i64>(0).unwrap()
}

fn seed(engine: &Engine, names: &[&str]) {
    let mut session = Session::new(engine);
    for name in names {
        session.add(&hero(name));
    }
    session.commit().unwrap();
}

#[test]
fn add_and_commit_assigns_generated_ids() {
    let engine = setup();
    let mut session = Session::new(&engine);
    let a = session.add(&hero("Deadpond"));
    let b = session.add(&hero("Rusty-Man"));
    assert!(session.has_pending());
    assert!(!session.in_transaction());

    session.commit().unwrap();
    assert!(!session.has_pending());
    assert!(!session.in_transaction());

    let a: Hero = session.object(&a).unwrap();
    let b: Hero = session.object(&b).unwrap();
    assert_eq!(a.id, Some(1));
    assert_eq!(b.id, Some(2));
    assert!(session.contains(&a));
    assert_eq!(count_heroes(&engine), 2);
}

#[test]
fn get_reads_through_identity_map_until_refresh() {
    let engine = setup();
    seed(&engine, &["Deadpond"]);

    let mut session = Session::new(&engine);
    let loaded: Hero = session.get(1_i64).unwrap().unwrap();
    assert_eq!(loaded.rank.as_deref(), Some("rookie"));

    engine
        .execute("UPDATE hero SET name = 'Changed' WHERE id = 1", &Params::new())
        .unwrap();

    // integer width does not matter for lookups
    let cached: Hero = session.get(1_i32).unwrap().unwrap();
    assert_eq!(cached.name, "Deadpond");

    let fresh = session.refresh(&cached).unwrap().unwrap();
    assert_eq!(fresh.name, "Changed");
}

#[test]
fn get_missing_key_is_none() {
    let engine = setup();
    let mut session = Session::new(&engine);
    assert!(session.get::<Hero>(42_i64).unwrap().is_none());

    let err = session
        .get::<Hero>(vec![Value::BigInt(1), Value::BigInt(2)])
        .unwrap_err();
    assert!(err.to_string().contains("primary key"));
}

#[test]
fn merge_updates_existing_rows_and_inserts_missing_ones() {
    let engine = setup();
    seed(&engine, &["Deadpond"]);

    let mut session = Session::new(&engine);
    let mut existing = hero("Deadpond");
    existing.id = Some(1);
    existing.age = Some(30);
    session.merge(existing).unwrap();

    let mut missing = hero("Spider-Boy");
    missing.id = Some(7);
    session.merge(missing).unwrap();
    session.commit().unwrap();

    let rows = engine
        .query("SELECT id, age FROM hero ORDER BY id", &Params::new())
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get_named::<Option<i64>>("age").unwrap(), Some(30));
    assert_eq!(rows[1].get_named::<i64>("id").unwrap(), 7);
}

#[test]
fn add_of_tracked_object_schedules_update() {
    let engine = setup();
    seed(&engine, &["Deadpond"]);

    let mut session = Session::new(&engine);
    let mut loaded: Hero = session.get(1_i64).unwrap().unwrap();
    loaded.age = Some(48);
    session.add(&loaded);
    session.commit().unwrap();

    let rows = engine
        .query("SELECT age FROM hero WHERE id = 1", &Params::new())
        .unwrap();
    assert_eq!(rows[0].get_as::<i64>(0).unwrap(), 48);
    assert_eq!(count_heroes(&engine), 1);
}

#[test]
fn delete_removes_row() {
    let engine = setup();
    seed(&engine, &["Deadpond"]);

    let mut session = Session::new(&engine);
    let loaded: Hero = session.get(1_i64).unwrap().unwrap();
    session.delete(&loaded).unwrap();
    assert!(session.get::<Hero>(1_i64).unwrap().is_none());
    session.commit().unwrap();
    assert_eq!(count_heroes(&engine), 0);

    // a key with no row is not an error
    let mut ghost = hero("ghost");
    ghost.id = Some(99);
    session.delete(&ghost).unwrap();
    session.commit().unwrap();

    assert!(session.delete(&hero("keyless")).is_err());
}

#[test]
fn flush_deletes_before_inserting() {
    let engine = setup();
    seed(&engine, &["Deadpond"]);

    let mut session = Session::new(&engine);
    let old: Hero = session.get(1_i64).unwrap().unwrap();
    session.delete(&old).unwrap();
    let key = session.add(&hero("Deadpond"));
    session.commit().unwrap();

    let replacement: Hero = session.object(&key).unwrap();
    assert!(replacement.id.is_some());
    assert_eq!(replacement.name, "Deadpond");
    assert_eq!(count_heroes(&engine), 1);
}

#[test]
fn rollback_discards_flushed_writes() {
    let engine = setup();
    let mut session = Session::new(&engine);
    session.add(&hero("a"));
    session.flush().unwrap();
    assert!(session.in_transaction());
    assert_eq!(count_heroes(&engine), 1);

    session.rollback().unwrap();
    assert_eq!(count_heroes(&engine), 0);
    assert!(!engine.in_transaction());
}

#[test]
fn drop_without_commit_rolls_back() {
    let engine = setup();
    {
        let mut session = Session::new(&engine);
        session.add(&hero("b"));
        session.flush().unwrap();
    }
    assert!(!engine.in_transaction());
    assert_eq!(count_heroes(&engine), 0);
}

#[test]
fn failed_flush_leaves_no_partial_writes() {
    let engine = setup();
    let mut session = Session::new(&engine);
    session.add(&hero("twin"));
    session.add(&hero("twin"));

    let err = session.commit().unwrap_err();
    assert!(err.is_unique_violation());
    session.rollback().unwrap();
    assert_eq!(count_heroes(&engine), 0);
}

#[test]
fn exec_runs_structured_and_raw_statements() {
    let engine = setup();
    seed(&engine, &["a", "b", "c"]);

    let mut session = Session::new(&engine);
    let select = Select::<Hero>::new()
        .filter(Expr::col("id").in_list(vec![1_i64, 2]))
        .order_by(OrderBy::desc("id"));
    let heroes = session.exec(&select, &Params::new()).unwrap();
    let ids: Vec<Option<i64>> = heroes.iter().map(|h| h.id).collect();
    assert_eq!(ids, vec![Some(2), Some(1)]);

    let row = session
        .exec_first(
            &text("SELECT name FROM hero WHERE id = :id"),
            &params! { "id" => 3_i64 },
        )
        .unwrap()
        .unwrap();
    assert_eq!(row.get_named::<String>("name").unwrap(), "c");
}

#[test]
fn exec_sees_pending_writes() {
    let engine = setup();
    let mut session = Session::new(&engine);
    session.add(&hero("pending"));

    let heroes = session.exec(&Select::<Hero>::new(), &Params::new()).unwrap();
    assert_eq!(heroes.len(), 1);
    assert!(session.in_transaction());
    session.close().unwrap();
    assert_eq!(count_heroes(&engine), 0);
}

#[test]
fn other_threads_wait_for_the_open_transaction() {
    let engine = setup();
    let mut session = Session::new(&engine);
    session.add(&hero("uncommitted"));
    session.flush().unwrap();

    let reader = {
        let engine = engine.clone();
        std::thread::spawn(move || count_heroes(&engine))
    };
    std::thread::sleep(std::time::Duration::from_millis(50));
    assert!(!reader.is_finished());

    session.commit().unwrap();
    assert_eq!(reader.join().unwrap(), 1);
}

#[test]
fn concurrent_sessions_serialize_their_writes() {
    let engine = setup();
    let workers: Vec<_> = (0..4)
        .map(|t| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    let mut session = Session::new(&engine);
                    session.add(&hero(&format!("t{t}-{i}")));
                    session.commit().unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(count_heroes(&engine), 100);
    assert!(!engine.in_transaction());
}

#[test]
fn nested_session_on_the_same_thread_is_a_savepoint() {
    let engine = setup();
    let mut outer = Session::new(&engine);
    outer.add(&hero("outer"));
    outer.flush().unwrap();

    let mut inner = Session::new(&engine);
    inner.add(&hero("discarded"));
    inner.flush().unwrap();
    assert_eq!(engine.transaction_depth(), 2);
    inner.rollback().unwrap();

    let mut inner = Session::new(&engine);
    inner.add(&hero("inner"));
    inner.commit().unwrap();
    assert_eq!(engine.transaction_depth(), 1);
    assert_eq!(count_heroes(&engine), 2);

    outer.commit().unwrap();
    assert_eq!(count_heroes(&engine), 2);
    assert_eq!(engine.transaction_depth(), 0);

    let mut outer = Session::new(&engine);
    outer.add(&hero("gone"));
    outer.flush().unwrap();
    let mut inner = Session::new(&engine);
    inner.add(&hero("gone too"));
    inner.commit().unwrap();
    outer.rollback().unwrap();
    assert_eq!(count_heroes(&engine), 2);
}

#[test]
fn outer_session_cannot_commit_past_an_open_inner_one() {
    let engine = setup();
    let mut outer = Session::new(&engine);
    outer.add(&hero("outer"));
    outer.flush().unwrap();
    let mut inner = Session::new(&engine);
    inner.add(&hero("inner"));
    inner.flush().unwrap();

    assert!(matches!(
        outer.commit(),
        Err(sqlmodel_plus_core::Error::Transaction(_))
    ));
    inner.commit().unwrap();
    outer.commit().unwrap();
    assert_eq!(count_heroes(&engine), 2);
}
