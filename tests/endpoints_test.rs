mod common;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use cie::tools::endpoints::{collect_endpoints, list_endpoints, ListEndpointsArgs, NO_ENDPOINTS_MESSAGE};
use common::{row, table, FakeQuerier};

const HEADERS: [&str; 4] = ["file_path", "name", "start_line", "code_text"];

fn function_row(file: &str, name: &str, line: i64, code: &str) -> Vec<cie::types::CellValue> {
    row(vec![json!(file), json!(name), json!(line), json!(code)])
}

fn many_routes(count: usize) -> FakeQuerier {
    let rows = (0..count)
        .map(|i| {
            function_row(
                "internal/api/routes.go",
                &format!("route{}", i),
                i as i64 + 1,
                &format!(r#"r.GET("/v1/items/{}", h)"#, i),
            )
        })
        .collect();
    FakeQuerier::new().respond("*cie_function_code", table(&HEADERS, rows))
}

#[tokio::test]
async fn test_truncates_to_limit_with_warning() {
    let client = many_routes(500);
    let args = ListEndpointsArgs {
        limit: 10,
        ..Default::default()
    };
    let result = list_endpoints(&client, &CancellationToken::new(), &args)
        .await
        .unwrap();

    assert!(!result.is_error);
    let table_rows = result
        .text
        .lines()
        .filter(|l| l.starts_with("| GET |"))
        .count();
    assert_eq!(table_rows, 10);
    assert!(result.text.starts_with("## HTTP Endpoints (10 found)"));
    assert!(result.text.contains(
        "Found 500 endpoints but showing only 10 (limit). Use `limit=500` or higher to see all results."
    ));
}

#[tokio::test]
async fn test_query_limit_is_capped() {
    let client = many_routes(1);
    let args = ListEndpointsArgs {
        limit: 10,
        ..Default::default()
    };
    list_endpoints(&client, &CancellationToken::new(), &args)
        .await
        .unwrap();
    assert!(client.scripts()[0].ends_with(" :limit 30"));

    let client = many_routes(1);
    let args = ListEndpointsArgs {
        limit: 1000,
        ..Default::default()
    };
    list_endpoints(&client, &CancellationToken::new(), &args)
        .await
        .unwrap();
    assert!(client.scripts()[0].ends_with(" :limit 500"));
}

#[tokio::test]
async fn test_script_excludes_test_files_and_quotes_pattern() {
    let client = FakeQuerier::new();
    let args = ListEndpointsArgs {
        path_pattern: r#"apps/"x"), evil"#.to_string(),
        ..Default::default()
    };
    list_endpoints(&client, &CancellationToken::new(), &args)
        .await
        .unwrap();

    let script = &client.scripts()[0];
    assert!(script.contains(r#"regex_matches(file_path, ___"apps/"x"), evil"___)"#));
    assert!(script.contains("!regex_matches(file_path, ___\"(_test[.]"));
}

#[tokio::test]
async fn test_extraction_is_idempotent() {
    let rows = vec![
        function_row("a/routes.go", "Setup", 3, r#"r.GET("/a", a); r.GET("/a", a2); app.Post("/b", b)"#),
        function_row("b/routes.go", "Setup", 9, r#"mux.Handle("/static/", fs); r.Group("/api")"#),
    ];
    let args = ListEndpointsArgs::default();
    let first = collect_endpoints(&rows, &args);
    let second = collect_endpoints(&rows, &args);
    assert_eq!(first, second);

    let keys: Vec<(&str, &str, &str)> = first
        .iter()
        .map(|e| (e.method.as_str(), e.path.as_str(), e.file_path.as_str()))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("GET", "/a", "a/routes.go"),
            ("POST", "/b", "a/routes.go"),
            ("ANY", "/static/", "b/routes.go"),
            ("ANY", "/api", "b/routes.go"),
        ]
    );
}

#[tokio::test]
async fn test_same_route_in_two_files_kept() {
    let client = FakeQuerier::new().respond(
        "*cie_function_code",
        table(
            &HEADERS,
            vec![
                function_row("svc/a/main.go", "main", 5, r#"r.GET("/health", h)"#),
                function_row("svc/b/main.go", "main", 7, r#"r.GET("/health", h)"#),
            ],
        ),
    );
    let result = list_endpoints(&client, &CancellationToken::new(), &ListEndpointsArgs::default())
        .await
        .unwrap();
    assert!(result.text.contains("## HTTP Endpoints (2 found)"));
    assert!(result.text.contains("| GET | `/health` | main | main.go:5 |"));
    assert!(result.text.contains("| GET | `/health` | main | main.go:7 |"));
    // both files share a base name
    assert!(!result.text.contains("**By File:**"));
}

#[tokio::test]
async fn test_method_and_path_filters() {
    let client = FakeQuerier::new().respond(
        "*cie_function_code",
        table(
            &HEADERS,
            vec![function_row(
                "api/routes.go",
                "Routes",
                1,
                r#"r.GET("/v1/Users", a); r.POST("/v1/users", b); http.HandleFunc("/v1/users/export", c); r.GET("/v2/orders", d)"#,
            )],
        ),
    );
    let args = ListEndpointsArgs {
        method: "post".to_string(),
        path_filter: "USERS".to_string(),
        ..Default::default()
    };
    let result = list_endpoints(&client, &CancellationToken::new(), &args)
        .await
        .unwrap();

    assert!(result.text.starts_with("## HTTP Endpoints matching `USERS` (2 found)"));
    assert!(result.text.contains("| POST | `/v1/users` |"));
    assert!(result.text.contains("| ANY | `/v1/users/export` |"));
    assert!(!result.text.contains("| GET |"));
    assert!(result.text.contains("**By Method:**\n- POST: 1\n- ANY: 1\n"));
}

#[tokio::test]
async fn test_no_matches_renders_tips() {
    let client = FakeQuerier::new().respond(
        "*cie_function_code",
        table(
            &HEADERS,
            vec![function_row("a.go", "f", 1, r#"cache.Get(key); client.Post(url)"#)],
        ),
    );
    let result = list_endpoints(&client, &CancellationToken::new(), &ListEndpointsArgs::default())
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.text, NO_ENDPOINTS_MESSAGE);
}

#[tokio::test]
async fn test_query_failure_propagates() {
    let client = FakeQuerier::new().fail("*cie_function_code", "connection reset");
    let err = list_endpoints(&client, &CancellationToken::new(), &ListEndpointsArgs::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("connection reset"));
}
