//! Search adapter tests: bool query lowering and native paging.

#[cfg(test)]
mod tests {
    use nosql_select_core::{QueryError, SearchAdapter, SelectConfig};
    use nosql_select_model::SortOrder;
    use serde_json::json;

    use crate::{MemorySearch, id_range, ids, user_json};

    fn adapter(documents: usize) -> SearchAdapter<MemorySearch> {
        let documents = (1..=documents).map(user_json).collect();
        SearchAdapter::new(MemorySearch::new(documents), SelectConfig::default())
    }

    #[test]
    fn test_should_send_bool_query_with_native_paging() -> anyhow::Result<()> {
        let adapter = adapter(30);
        let select = adapter
            .select()
            .from("users")
            .from("users-archive")
            .and_where("category = :c: AND created >= :since:")
            .and_where("banned IS NOT NULL")
            .bind("c", "odd")
            .bind("since", 3)
            .columns(["id"])
            .order_by("created", SortOrder::Desc)
            .limit(10, 10);

        let rows = adapter.fetch(&select)?;
        assert_eq!(rows.total, 30);
        assert_eq!(ids(&rows.items), id_range(11, 20));

        let request = &adapter.backend().requests()[0];
        assert_eq!(request.index, "users,users-archive");
        assert_eq!(
            serde_json::to_value(&request.body)?,
            json!({
                "query": {"bool": {"must": [
                    {"term": {"category": "odd"}},
                    {"range": {"created": {"gte": 3}}},
                    {"exists": {"field": "banned"}}
                ]}},
                "sort": [{"created": {"order": "desc"}}],
                "_source": ["id"],
                "from": 10,
                "size": 10
            })
        );
        Ok(())
    }

    #[test]
    fn test_should_require_one_of_the_or_alternatives() -> anyhow::Result<()> {
        let adapter = adapter(0);
        let select = adapter
            .select()
            .from("users")
            .and_where("tenant = :t:")
            .or_where("status = :s:")
            .or_where("owner = :o: AND shared != :no:")
            .bind("t", "acme")
            .bind("s", "public")
            .bind("o", "u01")
            .bind("no", false);

        let plan = adapter.compile(&select)?;
        let query = serde_json::to_value(&plan.native_params.body.query)?;
        assert_eq!(
            query,
            json!({"bool": {"must": [
                {"term": {"tenant": "acme"}},
                {"bool": {
                    "should": [
                        {"term": {"status": "public"}},
                        {"bool": {
                            "must": [{"term": {"owner": "u01"}}],
                            "must_not": [{"term": {"shared": false}}]
                        }}
                    ],
                    "minimum_should_match": 1
                }}
            ]}})
        );
        Ok(())
    }

    #[test]
    fn test_should_lower_like_for_search_backend() -> anyhow::Result<()> {
        let adapter = adapter(0);
        let cases = [
            ("%abc%", json!({"wildcard": {"name": {"value": "*abc*"}}})),
            ("abc%", json!({"wildcard": {"name": {"value": "abc*"}}})),
            ("abc", json!({"term": {"name": "abc"}})),
        ];
        for (pattern, expected) in cases {
            let select = adapter
                .select()
                .from("users")
                .and_where("name LIKE :n:")
                .bind("n", pattern);
            let plan = adapter.compile(&select)?;
            let query = serde_json::to_value(&plan.native_params.body.query)?;
            assert_eq!(query, json!({"bool": {"must": [expected]}}));
        }
        Ok(())
    }

    #[test]
    fn test_should_lower_membership_and_null_checks() -> anyhow::Result<()> {
        let adapter = adapter(0);
        let select = adapter
            .select()
            .from("users")
            .in_where("category", ["odd", "even"])
            .and_where("id NOT IN (:a:, :b:) AND deleted IS NULL")
            .bind("a", "u01")
            .bind("b", "u02");

        let plan = adapter.compile(&select)?;
        let query = serde_json::to_value(&plan.native_params.body.query)?;
        assert_eq!(
            query,
            json!({"bool": {
                "must": [{"terms": {"category": ["odd", "even"]}}],
                "must_not": [
                    {"terms": {"id": ["u01", "u02"]}},
                    {"exists": {"field": "deleted"}}
                ]
            }})
        );
        Ok(())
    }

    #[test]
    fn test_should_reject_missing_index_and_bad_syntax() {
        let adapter = adapter(0);
        assert!(matches!(
            adapter.fetch(&adapter.select()),
            Err(QueryError::MissingSource)
        ));

        let select = adapter.select().from("users").and_where("(a = :a: OR b = :b:");
        assert!(matches!(adapter.fetch(&select), Err(QueryError::Syntax { .. })));

        let select = adapter.select().from("users").and_where("a = :missing:");
        assert!(matches!(
            adapter.fetch(&select),
            Err(QueryError::UnboundParameter { ref name }) if name == "missing"
        ));
        assert!(adapter.backend().requests().is_empty());
    }
}
