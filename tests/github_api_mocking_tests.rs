//! GitHub REST client tests against a wiremock server
//!
//! The client is pointed at the mock server's URI, so every request the
//! sweeper would make is answered deterministically with no network access.

use pr_sweep::github::{
    collect_pages, GitHubClient, GitHubError, GitHubOps, MergeMethod, MergeableState, RepoRef,
    SEARCH_PAGE_SIZE,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// GitHub API mock server for deterministic testing
struct GitHubApiMock {
    server: MockServer,
}

impl GitHubApiMock {
    async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    fn client(&self) -> GitHubClient {
        GitHubClient::new("mock-token".to_string(), Some(&self.server.uri()), 100).unwrap()
    }

    fn search_item(number: u64) -> Value {
        json!({
            "number": number,
            "title": format!("Change {number}"),
            "html_url": format!("https://github.com/acme/widgets/pull/{number}"),
            "repository_url": "https://api.github.com/repos/acme/widgets",
            "pull_request": { "url": "https://api.github.com/repos/acme/widgets/pulls/1" }
        })
    }

    async fn mock_search_page(&self, page: u32, count: u64) {
        let items: Vec<Value> = (0..count)
            .map(|n| Self::search_item(u64::from(page) * 1000 + n))
            .collect();
        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .and(query_param("q", "is:pr is:open author:octo"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 237,
                "incomplete_results": false,
                "items": items
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    async fn mock_error(&self, verb: &str, route: &str, status: u16, message: &str) {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "message": message,
                "documentation_url": "https://docs.github.com/rest"
            })))
            .mount(&self.server)
            .await;
    }
}

fn repo() -> RepoRef {
    RepoRef::new("acme", "widgets")
}

#[tokio::test]
async fn test_search_pages_until_a_short_page() {
    let mock = GitHubApiMock::new().await;
    mock.mock_search_page(1, 100).await;
    mock.mock_search_page(2, 100).await;
    mock.mock_search_page(3, 37).await;
    let client = mock.client();

    let prs = collect_pages(SEARCH_PAGE_SIZE, |page| {
        let client = &client;
        async move {
            client
                .search_open_pull_requests("octo", page, SEARCH_PAGE_SIZE)
                .await
        }
    })
    .await
    .unwrap();

    assert_eq!(prs.len(), 237);
    assert!(prs.iter().all(|pr| pr.repo == repo()));
    assert_eq!(prs[0].number, 1000);
}

#[tokio::test]
async fn test_bad_credentials_map_to_authentication_error() {
    let mock = GitHubApiMock::new().await;
    mock.mock_error("GET", "/user", 401, "Bad credentials").await;

    let err = mock.client().current_user().await.unwrap_err();
    assert!(err.is_authentication());
    assert!(!err.troubleshooting().is_empty());
}

#[tokio::test]
async fn test_pull_request_detail_parses_mergeable_state() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "number": 7,
            "title": "Fix parser",
            "html_url": "https://github.com/acme/widgets/pull/7",
            "state": "open",
            "draft": false,
            "mergeable": false,
            "mergeable_state": "dirty",
            "head": { "ref": "fix-parser", "sha": "aaa111" },
            "base": { "ref": "main", "sha": "bbb222" }
        })))
        .mount(&mock.server)
        .await;

    let detail = mock.client().pull_request(&repo(), 7).await.unwrap();
    assert_eq!(detail.mergeable_state, MergeableState::Dirty);
    assert!(detail.has_conflicts());
    assert_eq!(detail.head.name, "fix-parser");
    assert_eq!(detail.base.sha, "bbb222");
}

#[tokio::test]
async fn test_merge_sends_method_and_reports_success() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("PUT"))
        .and(path("/repos/acme/widgets/pulls/7/merge"))
        .and(body_json(json!({ "merge_method": "squash" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "ccc333",
            "merged": true,
            "message": "Pull Request successfully merged"
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let outcome = mock
        .client()
        .merge_pull_request(&repo(), 7, MergeMethod::Squash)
        .await
        .unwrap();
    assert!(outcome.merged);
    assert_eq!(outcome.sha.as_deref(), Some("ccc333"));
}

#[tokio::test]
async fn test_unmergeable_pull_request_is_a_rejection_not_an_error() {
    let mock = GitHubApiMock::new().await;
    mock.mock_error("PUT", "/repos/acme/widgets/pulls/7/merge", 405, "Pull Request is not mergeable")
        .await;

    let outcome = mock
        .client()
        .merge_pull_request(&repo(), 7, MergeMethod::Merge)
        .await
        .unwrap();
    assert!(!outcome.merged);
    assert_eq!(outcome.message, "Pull Request is not mergeable");
}

#[tokio::test]
async fn test_close_patches_state() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("PATCH"))
        .and(path("/repos/acme/widgets/pulls/7"))
        .and(body_json(json!({ "state": "closed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "number": 7, "state": "closed" })))
        .expect(1)
        .mount(&mock.server)
        .await;

    mock.client().close_pull_request(&repo(), 7).await.unwrap();
}

#[tokio::test]
async fn test_missing_branch_has_no_head() {
    let mock = GitHubApiMock::new().await;
    mock.mock_error("GET", "/repos/acme/widgets/git/ref/heads/gone", 404, "Not Found")
        .await;

    let head = mock.client().branch_head(&repo(), "gone").await.unwrap();
    assert!(head.is_none());
}

#[tokio::test]
async fn test_backup_branch_is_created_from_base_sha() {
    let mock = GitHubApiMock::new().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/git/refs"))
        .and(body_json(json!({
            "ref": "refs/heads/pr-sweep-backup/pr-7-20260101-120000",
            "sha": "bbb222"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ref": "refs/heads/pr-sweep-backup/pr-7-20260101-120000",
            "object": { "sha": "bbb222", "type": "commit" }
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    mock.client()
        .create_branch(&repo(), "pr-sweep-backup/pr-7-20260101-120000", "bbb222")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_server_errors_keep_their_status() {
    let mock = GitHubApiMock::new().await;
    mock.mock_error("GET", "/repos/acme/widgets/commits/aaa111/status", 502, "Bad Gateway")
        .await;

    let err = mock
        .client()
        .combined_status(&repo(), "aaa111")
        .await
        .unwrap_err();
    assert!(matches!(err, GitHubError::Api { status: 502, .. }));
    assert!(!err.is_authentication());
}
