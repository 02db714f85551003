mod common;

use common::{memory_client, memory_store, seed, RecordingBackend};
use rowlayer::{
    bson::{doc, Bson},
    error::DUPLICATE_CODE,
    memory::InMemoryStore,
    prelude::*,
};

async fn all_rows(client: &Client<impl DocumentBackend>, table: &str) -> Vec<Row> {
    client.from(table).select("*").order("id", true).await.into_rows()
}

#[tokio::test]
async fn generated_ids_are_unique() {
    let client = memory_client().await;

    let first = client.from("students").insert(doc! { "first_name": "A" }).await;
    let second = client.from("students").insert(doc! { "first_name": "B", "id": "" }).await;

    let first_id = first.as_row().unwrap().get_str("id").unwrap();
    let second_id = second.as_row().unwrap().get_str("id").unwrap();
    assert!(!first_id.is_empty());
    assert!(!second_id.is_empty());
    assert_ne!(first_id, second_id);
}

#[tokio::test]
async fn supplied_ids_are_kept() {
    let client = memory_client().await;

    let result = client.from("students").insert(doc! { "id": "X", "first_name": "A" }).await;

    assert_eq!(result.as_row().unwrap().get_str("id").unwrap(), "X");
}

#[tokio::test]
async fn insert_shape_follows_the_payload() {
    let client = memory_client().await;

    let one = client.from("logs").insert(doc! { "n": 1 }).await;
    assert!(one.as_row().is_some());

    let many = client.from("logs").insert(vec![doc! { "n": 2 }, doc! { "n": 3 }]).await;
    assert_eq!(many.as_rows().unwrap().len(), 2);

    let single = client.from("logs").insert(vec![doc! { "n": 4 }]).single().await;
    assert_eq!(single.as_row().unwrap().get_i32("n").unwrap(), 4);
}

#[tokio::test]
async fn system_fields_are_stripped_from_payloads() {
    let client = memory_client().await;

    let result = client
        .from("students")
        .insert(doc! {
            "$id": "forged",
            "$createdAt": "1999-01-01T00:00:00.000Z",
            "$permissions": ["read(\"any\")"],
            "first_name": "Alice",
        })
        .await;
    let row = result.as_row().unwrap();

    assert_ne!(row.get_str("id").unwrap(), "forged");
    assert_ne!(row.get_str("created_at").unwrap(), "1999-01-01T00:00:00.000Z");
    assert!(row.keys().all(|key| !key.starts_with('$')));
}

#[tokio::test]
async fn duplicate_ids_fail_the_insert() {
    let client = memory_client().await;
    seed(&client, "students", vec![doc! { "id": "s1" }]).await;

    let result = client.from("students").insert(doc! { "id": "s1", "first_name": "B" }).await;

    assert!(result.data.is_none());
    assert_eq!(result.error.unwrap().code.as_deref(), Some(DUPLICATE_CODE));
}

#[tokio::test]
async fn insert_then_select_projects_returned_rows() {
    let client = memory_client().await;

    let result = client
        .from("students")
        .insert(doc! { "id": "s1", "first_name": "Alice", "city": "Lund" })
        .select("id, city")
        .await;

    assert_eq!(result.as_row().unwrap(), &doc! { "id": "s1", "city": "Lund" });
}

#[tokio::test]
async fn updating_nothing_is_not_an_error() {
    let client = memory_client().await;

    let result = client.from("students").update(doc! { "city": "Lund" }).eq("id", "missing").await;
    assert!(result.is_ok());
    assert_eq!(result.as_rows(), Some(&[][..]));

    let result = client
        .from("students")
        .update(doc! { "city": "Lund" })
        .eq("id", "missing")
        .single()
        .await;
    assert!(result.is_ok());
    assert!(result.data.is_none());
}

#[tokio::test]
async fn updates_apply_to_every_match() {
    let client = memory_client().await;
    seed(
        &client,
        "attendance",
        vec![
            doc! { "id": "a1", "status": "pending", "student_id": "s1" },
            doc! { "id": "a2", "status": "pending", "student_id": "s2" },
            doc! { "id": "a3", "status": "approved", "student_id": "s1" },
        ],
    )
    .await;

    let result = client
        .from("attendance")
        .update(doc! { "status": "approved", "id": "ignored", "$updatedAt": "never" })
        .eq("status", "pending")
        .await;

    let rows = result.as_rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.get_str("status").unwrap() == "approved"));
    assert_ne!(rows[0].get_str("updated_at").unwrap(), "never");

    let stored = all_rows(&client, "attendance").await;
    let ids: Vec<_> = stored.iter().map(|row| row.get_str("id").unwrap()).collect();
    assert_eq!(ids, vec!["a1", "a2", "a3"]);
    assert!(stored.iter().all(|row| row.get_str("status").unwrap() == "approved"));
}

#[tokio::test]
async fn updates_and_deletes_visit_matches_beyond_one_batch() {
    let backend = RecordingBackend::new(memory_store().await);
    let client = Client::with_config(backend.clone(), ClientConfig::new().with_batch_size(2)).unwrap();
    seed(&client, "logs", (0..5).map(|n| doc! { "n": n, "kind": "email" }).collect()).await;
    backend.clear();

    let updated = client.from("logs").update(doc! { "sent": true }).eq("kind", "email").await;
    assert_eq!(updated.as_rows().unwrap().len(), 5);
    assert_eq!(backend.listings_of("logs").len(), 3);

    let deleted = client.from("logs").delete().eq("kind", "email").await;
    assert!(deleted.is_ok());
    assert!(all_rows(&client, "logs").await.is_empty());
}

#[tokio::test]
async fn deletes_return_null_unless_rows_are_selected() {
    let client = memory_client().await;
    seed(
        &client,
        "matches",
        vec![doc! { "id": "m1", "score": 1 }, doc! { "id": "m2", "score": 2 }, doc! { "id": "m3", "score": 3 }],
    )
    .await;

    let result = client.from("matches").delete().eq("id", "m1").await;
    assert!(result.is_ok());
    assert!(result.data.is_none());

    let result = client.from("matches").delete().gte("score", 2).select("id").await;
    assert_eq!(
        result.as_rows().unwrap(),
        &[doc! { "id": "m2" }, doc! { "id": "m3" }][..]
    );
    assert!(all_rows(&client, "matches").await.is_empty());
}

#[tokio::test]
async fn repeated_upserts_keep_one_document() {
    let client = memory_client().await;
    let options = UpsertOptions::new().on_conflict("email");

    let first = client
        .from("students")
        .upsert(
            vec![
                doc! { "email": "a@x.se", "first_name": "Alice" },
                doc! { "email": "a@x.se", "first_name": "Alicia" },
            ],
            options.clone(),
        )
        .await;
    assert!(first.is_ok());
    assert!(first.partial_failures.is_empty());

    let second = client
        .from("students")
        .upsert(vec![doc! { "email": "a@x.se", "first_name": "Ally", "city": "Lund" }], options)
        .await;

    let stored = all_rows(&client, "students").await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get_str("first_name").unwrap(), "Ally");
    assert_eq!(stored[0].get_str("city").unwrap(), "Lund");
    assert_eq!(
        second.as_rows().unwrap()[0].get_str("id").unwrap(),
        stored[0].get_str("id").unwrap()
    );
}

#[tokio::test]
async fn composite_conflict_keys_must_all_match() {
    let client = memory_client().await;
    let options = UpsertOptions::new().on_conflict("internship_id,student_id,date");
    let row = |date: &str, hours: i32| {
        doc! { "internship_id": "i1", "student_id": "s1", "date": date, "hours": hours }
    };

    client
        .from("attendance")
        .upsert(vec![row("2024-05-01", 4), row("2024-05-02", 6)], options.clone())
        .await;
    client
        .from("attendance")
        .upsert(vec![row("2024-05-01", 8)], options)
        .await;

    let stored = all_rows(&client, "attendance").await;
    assert_eq!(stored.len(), 2);

    let hours: Vec<_> = client
        .from("attendance")
        .select("date, hours")
        .order("date", true)
        .await
        .into_rows();
    assert_eq!(
        hours,
        vec![doc! { "date": "2024-05-01", "hours": 8 }, doc! { "date": "2024-05-02", "hours": 6 }]
    );
}

#[tokio::test]
async fn items_without_conflict_values_are_created() {
    let client = memory_client().await;
    let options = UpsertOptions::new().on_conflict("email");

    client
        .from("students")
        .upsert(vec![doc! { "first_name": "A" }, doc! { "first_name": "B", "email": Bson::Null }], options.clone())
        .await;
    client
        .from("students")
        .upsert(vec![doc! { "first_name": "C" }], UpsertOptions::new())
        .await;

    assert_eq!(all_rows(&client, "students").await.len(), 3);
}

#[tokio::test]
async fn ignored_duplicates_are_left_untouched() {
    let client = memory_client().await;
    seed(&client, "students", vec![doc! { "email": "a@x.se", "first_name": "Alice" }]).await;

    let result = client
        .from("students")
        .upsert(
            vec![
                doc! { "email": "a@x.se", "first_name": "Changed" },
                doc! { "email": "b@x.se", "first_name": "Bob" },
            ],
            UpsertOptions::new().on_conflict("email").ignore_duplicates(true),
        )
        .await;

    let returned = result.as_rows().unwrap();
    assert_eq!(returned.len(), 1);
    assert_eq!(returned[0].get_str("first_name").unwrap(), "Bob");

    let alice = client.from("students").select("first_name").eq("email", "a@x.se").single().await;
    assert_eq!(alice.as_row().unwrap(), &doc! { "first_name": "Alice" });
}

#[tokio::test]
async fn failed_upsert_items_are_reported_and_skipped() {
    let client = memory_client().await;
    seed(&client, "students", vec![doc! { "id": "taken", "email": "old@x.se" }]).await;

    let result = client
        .from("students")
        .upsert(
            vec![
                doc! { "email": "a@x.se" },
                doc! { "id": "taken", "email": "new@x.se" },
                doc! { "email": "c@x.se" },
            ],
            UpsertOptions::new().on_conflict("email"),
        )
        .await;

    assert!(result.is_ok());
    assert_eq!(result.as_rows().unwrap().len(), 2);
    assert_eq!(result.partial_failures.len(), 1);
    assert_eq!(result.partial_failures[0].index, 1);
    assert!(result.partial_failures[0].message.contains("taken"));
    assert_eq!(all_rows(&client, "students").await.len(), 3);
}

#[tokio::test]
async fn builders_are_values() {
    let store: InMemoryStore = memory_store().await;
    let client = Client::new(store);
    seed(&client, "students", vec![doc! { "id": "s1", "city": "Lund" }, doc! { "id": "s2", "city": "Umeå" }]).await;

    let base = client.from("students").select("id");
    let lund = base.clone().eq("city", "Lund");

    assert_eq!(base.await.into_rows().len(), 2);
    assert_eq!(lund.await.into_rows(), vec![doc! { "id": "s1" }]);
}
