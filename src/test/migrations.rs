#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::Row;

    use crate::database::Table;
    use crate::test::utils::TestDbBuilder;

    #[rocket::async_test]
    async fn test_migrations_create_every_table() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Migrations failed");

        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(&pool)
            .await
            .unwrap();
        let tables: Vec<String> = rows.iter().map(|r| r.get::<String, _>("name")).collect();

        for table in Table::ALL {
            assert!(tables.contains(&table.name().to_string()), "missing {}", table.name());
        }
        for extra in ["groups", "group_members", "tag_suggestions", "flagged_entities", "observation_intake"] {
            assert!(tables.iter().any(|t| t == extra), "missing {}", extra);
        }

        // Running again is a no-op.
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    }

    #[rocket::async_test]
    async fn test_schema_enforces_ranges_statuses_and_unique_attendance() {
        let test_db = TestDbBuilder::new()
            .coach("c1", "Coach Carter")
            .player("p1", "Maya Lopez", &[], None)
            .session("s1", "c1", None)
            .build()
            .await
            .unwrap();

        let out_of_range = sqlx::query("UPDATE persons SET responsibility_tier = 7 WHERE id = 'p1'")
            .execute(&test_db.pool)
            .await;
        assert!(out_of_range.is_err());

        let unknown_status = sqlx::query("UPDATE sessions SET status = 'archived'")
            .execute(&test_db.pool)
            .await;
        assert!(unknown_status.is_err());

        let session_id = test_db.session_id("s1");
        let insert = "INSERT INTO attendance (session_id, person_id, present, recorded_by) VALUES (?, 'p1', TRUE, 'c1')";
        sqlx::query(insert).bind(&session_id).execute(&test_db.pool).await.unwrap();
        assert!(sqlx::query(insert).bind(&session_id).execute(&test_db.pool).await.is_err());
    }
}
