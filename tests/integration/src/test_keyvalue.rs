//! Key-value adapter tests: key/filter split, index selection and lowering.

#[cfg(test)]
mod tests {
    use nosql_select_core::compiler::QueryMethod;
    use nosql_select_core::{KeyValueAdapter, QueryError, SelectConfig};
    use nosql_select_model::{AttributeValue, SortOrder};
    use serde_json::json;

    use crate::{
        MemoryStore, Recorded, events_table, id_range, ids, user_json, users, users_table,
    };

    fn users_adapter() -> KeyValueAdapter<MemoryStore> {
        KeyValueAdapter::new(MemoryStore::new(users_table(), users(3)), SelectConfig::default())
    }

    #[test]
    fn test_should_split_primary_key_from_filter() -> anyhow::Result<()> {
        let adapter = users_adapter();
        let select = adapter
            .select()
            .from("users")
            .and_where("id=:p1: AND status=:p2:")
            .bind("p1", "u01")
            .bind("p2", "active");

        let plan = adapter.compile(&select)?;
        assert_eq!(plan.method, QueryMethod::IndexedQuery);

        let params = serde_json::to_value(&plan.native_params)?;
        assert_eq!(params["TableName"], "users");
        assert_eq!(params["KeyConditionExpression"], "#id = :p1");
        assert_eq!(params["FilterExpression"], "#status = :p2");
        assert_eq!(
            params["ExpressionAttributeNames"],
            json!({"#id": "id", "#status": "status"})
        );
        assert_eq!(params["Limit"], 20);
        assert_eq!(params["ConsistentRead"], false);
        assert!(params.get("IndexName").is_none());
        Ok(())
    }

    #[test]
    fn test_should_execute_indexed_query_and_return_json_rows() -> anyhow::Result<()> {
        let adapter = users_adapter();
        let select = adapter
            .select()
            .from("users")
            .and_where_args("id = ?", ["u02"])
            .limit(0, 0);

        let rows = adapter.fetch_rows(&select)?;
        assert_eq!(rows.items[0], user_json(1));
        assert_eq!(ids(&rows.items), id_range(1, 3));

        let Recorded::Query(input) = &adapter.backend().requests()[0] else {
            panic!("expected a Query call");
        };
        assert_eq!(input.key_condition_expression.as_deref(), Some("#id = :arg_0"));
        assert_eq!(
            input.expression_attribute_values[":arg_0"],
            AttributeValue::S("u02".to_owned())
        );
        Ok(())
    }

    #[test]
    fn test_should_require_key_condition_on_selected_index() {
        let adapter = users_adapter();
        let select = adapter
            .select()
            .from("users")
            .from("by_category")
            .and_where("status = :s:")
            .bind("s", "active");

        let err = adapter.compile(&select).unwrap_err();
        assert!(matches!(
            err,
            QueryError::MissingIndexKeyCondition { ref index } if index == "by_category"
        ));
        assert!(adapter.backend().requests().is_empty());
    }

    #[test]
    fn test_should_query_index_with_its_own_key_schema() -> anyhow::Result<()> {
        let adapter = users_adapter();
        let select = adapter
            .select()
            .from("users")
            .index("by_category")
            .and_where("category = :c: AND created >= :since: AND id != :me:")
            .bind("c", "odd")
            .bind("since", 2)
            .bind("me", "u03")
            .order_by("created", SortOrder::Desc);

        let plan = adapter.compile(&select)?;
        let params = &plan.native_params;
        assert_eq!(plan.method, QueryMethod::IndexedQuery);
        assert_eq!(params.index_name.as_deref(), Some("by_category"));
        assert_eq!(
            params.key_condition_expression.as_deref(),
            Some("#category = :c AND #created >= :since")
        );
        assert_eq!(params.filter_expression.as_deref(), Some("#id <> :me"));
        assert_eq!(params.scan_index_forward, Some(false));
        assert_eq!(
            params.expression_attribute_values[":since"],
            AttributeValue::N("2".to_owned())
        );
        Ok(())
    }

    #[test]
    fn test_should_scan_when_no_partition_key_is_constrained() -> anyhow::Result<()> {
        let adapter = users_adapter();
        let select = adapter
            .select()
            .from("users")
            .in_where("category", ["odd", "even"])
            .and_where("deleted IS NULL")
            .columns(["id", "profile.name"]);

        let page = adapter.fetch(&select, None)?;
        assert_eq!(page.total_returned, 3);

        let Recorded::Scan(input) = &adapter.backend().requests()[0] else {
            panic!("expected a Scan call");
        };
        assert_eq!(
            input.filter_expression.as_deref(),
            Some(
                "#category IN (:in_category_0, :in_category_1) AND attribute_not_exists(#deleted)"
            )
        );
        assert_eq!(
            input.projection_expression.as_deref(),
            Some("#id, #profile.#name")
        );
        Ok(())
    }

    #[test]
    fn test_should_lower_like_for_key_value_backend() -> anyhow::Result<()> {
        let adapter = users_adapter();
        let cases = [
            ("%abc%", "contains(#name, :n)"),
            ("abc%", "begins_with(#name, :n)"),
            ("abc", "#name = :n"),
        ];
        for (pattern, expected) in cases {
            let select = adapter
                .select()
                .from("users")
                .and_where("name LIKE :n:")
                .bind("n", pattern);
            let plan = adapter.compile(&select)?;
            assert_eq!(plan.native_params.filter_expression.as_deref(), Some(expected));
        }

        let select = adapter
            .select()
            .from("users")
            .and_where("name LIKE :n:")
            .bind("n", "%abc");
        assert!(matches!(
            adapter.compile(&select),
            Err(QueryError::UnsupportedCondition { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_should_group_or_alternatives_in_filter() -> anyhow::Result<()> {
        let adapter = KeyValueAdapter::new(
            MemoryStore::new(events_table(), Vec::new()),
            SelectConfig {
                consistent_read: true,
                ..SelectConfig::default()
            },
        );
        let select = adapter
            .select()
            .from("events")
            .and_where("device = :d:")
            .or_where("level = :warn:")
            .or_where("level = :err:")
            .bind("d", "sensor-1")
            .bind("warn", "warn")
            .bind("err", "error")
            .order_by("ts", SortOrder::Asc);

        let plan = adapter.compile(&select)?;
        let params = &plan.native_params;
        assert_eq!(params.key_condition_expression.as_deref(), Some("#device = :d"));
        assert_eq!(
            params.filter_expression.as_deref(),
            Some("#level = :warn OR #level = :err")
        );
        assert_eq!(params.scan_index_forward, Some(true));
        assert_eq!(params.consistent_read, Some(true));
        Ok(())
    }

    #[test]
    fn test_should_reject_order_on_non_sort_key() {
        let adapter = KeyValueAdapter::new(
            MemoryStore::new(events_table(), Vec::new()),
            SelectConfig::default(),
        );
        let select = adapter
            .select()
            .from("events")
            .and_where("device = :d:")
            .bind("d", "sensor-1")
            .order_by("level", SortOrder::Asc);
        assert!(matches!(
            adapter.compile(&select),
            Err(QueryError::UnsupportedOrder { .. })
        ));
    }

    #[test]
    fn test_should_surface_unknown_table_as_backend_error() {
        let adapter = users_adapter();
        let select = adapter.select().from("orders");
        let err = adapter.fetch(&select, None).unwrap_err();
        assert!(matches!(err, QueryError::Backend(_)));
        assert!(err.to_string().contains("orders"));
    }
}
