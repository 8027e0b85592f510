//! Shared fixtures: a small catalogue with generated ids, defaults,
//! foreign keys, and the column names the permission heuristics react to.

use adminforge::SchemaRegistry;

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::from_json(
        r#"[
        {
            "name": "products",
            "columns": [
                {"name": "id", "type": "serial", "nullable": false, "primary_key": true, "auto_increment": true},
                {"name": "name", "type": "text", "nullable": false},
                {"name": "price", "type": "real", "nullable": false},
                {"name": "description", "type": "text", "nullable": true},
                {"name": "in_stock", "type": "boolean", "nullable": false, "default": true},
                {"name": "created_at", "type": "timestamptz", "nullable": false, "default": {"expression": "CURRENT_TIMESTAMP"}}
            ]
        },
        {
            "name": "orders",
            "columns": [
                {"name": "id", "type": "serial", "nullable": false, "primary_key": true, "auto_increment": true},
                {"name": "product_id", "type": "integer", "nullable": false, "foreign_key": {"table": "products", "column": "id"}},
                {"name": "user_id", "type": "text", "nullable": false},
                {"name": "status", "type": "text", "nullable": false, "default": "active"},
                {"name": "quantity", "type": "integer", "nullable": false}
            ]
        },
        {
            "name": "users",
            "columns": [
                {"name": "id", "type": "uuid", "nullable": false, "primary_key": true, "default": {"expression": "gen_random_uuid()"}},
                {"name": "email", "type": "text", "nullable": false},
                {"name": "password", "type": "text", "nullable": false}
            ]
        },
        {
            "name": "logs",
            "columns": [
                {"name": "id", "type": "serial", "nullable": false, "primary_key": true, "auto_increment": true},
                {"name": "message", "type": "text", "nullable": false}
            ]
        }
    ]"#,
    )
    .expect("fixture registry")
}
