//! Pagination through the key-value adapter.

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use nosql_select_core::pagination::ErrorMode;
    use nosql_select_core::{KeyValueAdapter, PaginationConfig, QueryError, Select, SelectConfig};
    use nosql_select_model::attribute_value::item_to_json;

    use crate::{MemoryStore, Recorded, id_range, ids, users, users_table};

    fn config() -> SelectConfig {
        SelectConfig {
            pagination: PaginationConfig {
                backoff: Duration::ZERO,
                ..PaginationConfig::default()
            },
            ..SelectConfig::default()
        }
    }

    fn adapter(store: MemoryStore) -> KeyValueAdapter<MemoryStore> {
        KeyValueAdapter::new(store, config())
    }

    fn window(limit: usize, skip: usize) -> Select {
        Select::new().from("users").limit(limit, skip)
    }

    #[test]
    fn test_should_assemble_limit_from_fixed_size_pages() -> anyhow::Result<()> {
        let adapter = adapter(MemoryStore::new(users_table(), users(30)).ignoring_limit());

        let page = adapter.fetch(&window(25, 0), None)?;
        assert_eq!(page.total_returned, 25);
        assert_eq!(page.next_cursor, None);
        assert_eq!(page.rounds, 3);

        let rows = adapter.fetch_rows(&window(25, 0))?;
        assert_eq!(ids(&rows.items), id_range(1, 25));
        Ok(())
    }

    #[test]
    fn test_should_read_everything_without_overshoot() -> anyhow::Result<()> {
        let adapter = adapter(MemoryStore::new(users_table(), users(30)).ignoring_limit());
        let rows = adapter.fetch_rows(&window(0, 0))?;
        assert_eq!(rows.count(), 30);
        assert_eq!(ids(&rows.items), id_range(1, 30));
        Ok(())
    }

    #[test]
    fn test_should_skip_independent_of_page_boundaries() -> anyhow::Result<()> {
        for page_size in [3, 7, 10, 25] {
            for honour_limit in [true, false] {
                let mut store =
                    MemoryStore::new(users_table(), users(30)).with_page_size(page_size);
                if !honour_limit {
                    store = store.ignoring_limit();
                }
                let adapter = adapter(store);
                let rows = adapter.fetch_rows(&window(10, 10))?;
                assert_eq!(
                    ids(&rows.items),
                    id_range(11, 20),
                    "page size {page_size}, honour limit {honour_limit}"
                );
            }
        }
        Ok(())
    }

    #[test]
    fn test_should_request_remaining_count_each_round() -> anyhow::Result<()> {
        let adapter = adapter(MemoryStore::new(users_table(), users(30)));
        let page = adapter.fetch(&window(25, 0), None)?;
        let limits: Vec<_> = adapter
            .backend()
            .requests()
            .iter()
            .map(Recorded::limit)
            .collect();
        assert_eq!(limits, vec![Some(25), Some(15), Some(5)]);
        assert!(page.next_cursor.is_some());
        Ok(())
    }

    #[test]
    fn test_should_resume_from_returned_cursor() -> anyhow::Result<()> {
        let adapter = adapter(MemoryStore::new(users_table(), users(30)));
        let first = adapter.fetch(&window(10, 0), None)?;
        let second = adapter.fetch(&window(10, 0), first.next_cursor)?;
        let third = adapter.fetch(&window(10, 0), second.next_cursor.clone())?;

        assert_eq!(second.total_returned, 10);
        assert_eq!(
            second.items[0]["id"].as_s(),
            Some("u11"),
            "second page starts after the first"
        );
        assert_eq!(third.total_returned, 10);
        assert_eq!(third.next_cursor, None);
        Ok(())
    }

    #[test]
    fn test_should_not_lose_items_between_overshooting_pages() -> anyhow::Result<()> {
        let adapter = adapter(MemoryStore::new(users_table(), users(40)).ignoring_limit());
        let first = adapter.fetch(&window(25, 0), None)?;
        let cursor = first.next_cursor.clone().expect("read is still live");
        assert_eq!(cursor.as_key()["id"].as_s(), Some("u25"));

        let second = adapter.fetch(&window(25, 0), Some(cursor))?;
        assert_eq!(second.next_cursor, None);

        let rows: Vec<_> = first
            .items
            .iter()
            .chain(&second.items)
            .map(item_to_json)
            .collect();
        assert_eq!(ids(&rows), id_range(1, 40));
        Ok(())
    }

    #[test]
    fn test_should_stop_endless_backend_after_six_rounds() -> anyhow::Result<()> {
        let adapter = adapter(MemoryStore::endless());
        let page = adapter.fetch(&Select::new().from("numbers"), None)?;
        assert_eq!(page.rounds, 6);
        assert_eq!(page.total_returned, 6);
        assert_eq!(adapter.backend().requests().len(), 6);
        assert!(page.next_cursor.is_some());
        Ok(())
    }

    #[test]
    fn test_should_back_off_every_second_round() -> anyhow::Result<()> {
        let config = SelectConfig {
            pagination: PaginationConfig {
                backoff: Duration::from_millis(20),
                ..PaginationConfig::default()
            },
            ..SelectConfig::default()
        };
        let adapter = KeyValueAdapter::new(MemoryStore::endless(), config);

        let started = Instant::now();
        adapter.fetch(&Select::new().from("numbers"), None)?;
        assert!(started.elapsed() >= Duration::from_millis(60));
        Ok(())
    }

    #[test]
    fn test_should_return_partial_page_when_budget_runs_out() -> anyhow::Result<()> {
        let config = SelectConfig {
            pagination: PaginationConfig {
                first_call_budget: Duration::ZERO,
                backoff: Duration::ZERO,
                ..PaginationConfig::default()
            },
            ..SelectConfig::default()
        };
        let adapter = KeyValueAdapter::new(MemoryStore::new(users_table(), users(30)), config);

        let page = adapter.fetch(&window(0, 0), None)?;
        assert_eq!(page.total_returned, 10);
        assert_eq!(page.next_cursor, None);
        assert_eq!(adapter.backend().requests().len(), 1);
        Ok(())
    }

    #[test]
    fn test_should_honour_error_mode_per_call() -> anyhow::Result<()> {
        let adapter = adapter_failing_on(2);
        let err = adapter
            .fetch_with(&window(0, 0), None, ErrorMode::Strict)
            .unwrap_err();
        assert!(matches!(err, QueryError::Backend(ref e) if e.is_throttling()));

        let adapter = adapter_failing_on(2);
        let page = adapter.fetch_with(&window(0, 0), None, ErrorMode::Lenient)?;
        assert_eq!(page.total_returned, 10);
        let cursor = page.next_cursor.expect("last good cursor is kept");
        assert_eq!(cursor.as_key()["id"].as_s(), Some("u10"));
        Ok(())
    }

    #[test]
    fn test_should_use_configured_error_mode() {
        let strict = KeyValueAdapter::new(
            MemoryStore::new(users_table(), users(30)).failing_on(1),
            SelectConfig {
                strict_errors: true,
                ..config()
            },
        );
        assert!(strict.fetch(&window(5, 0), None).is_err());

        let lenient = adapter_failing_on(1);
        let page = lenient.fetch(&window(5, 0), None).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    fn adapter_failing_on(call: usize) -> KeyValueAdapter<MemoryStore> {
        adapter(MemoryStore::new(users_table(), users(30)).failing_on(call))
    }
}
