//! Page Action Integration Tests
//!
//! `PageClient` requests against a wiremock page endpoint.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use skylibrary_uploadr::config::BackendConfig;
    use skylibrary_uploadr::page::{
        ActionOutcome, CommentThread, MediaFilter, Message, PageClient, PageError, Vote, VoteOutcome,
    };
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = "/en-us/media/view/12/";

    fn client(server: &MockServer) -> PageClient {
        PageClient::new(&BackendConfig {
            base_url: server.uri(),
            csrf_token: "csrf-tok".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_form() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PAGE))
            .and(query_param("request_type", "get_search_media_form"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"search_media_form": "<form></form>"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let html = client(&server).search_form(PAGE).await.unwrap();
        assert_eq!(html, "<form></form>");
    }

    #[tokio::test]
    async fn test_search_keeps_server_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PAGE))
            .and(body_string_contains("csrfmiddlewaretoken=csrf-tok"))
            .and(body_string_contains("request_type=search_media"))
            .and(body_string_contains("tags=nature%2Cbirds"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "search_results": {
                    "Zebra": {"link": "/m/3/", "rating": 4.5, "tags": [{"name": "nature"}]},
                    "Apple": {"link": "/m/1/", "rating": "3,5", "tags": []}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server)
            .search(PAGE, "animals", &["nature".to_string(), "birds".to_string()])
            .await
            .unwrap();

        let titles: Vec<&str> = outcome.results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Zebra", "Apple"]);
        assert_eq!(outcome.results[0].rating, "4.5");
        assert_eq!(outcome.results[1].rating, "3,5");
        assert_eq!(outcome.results[0].tags[0].name, "nature");
        assert!(outcome.messages.is_empty());
    }

    #[tokio::test]
    async fn test_filter_media_sends_criteria_and_keeps_list_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/en-us/"))
            .and(body_string_contains("request_type=filter_media"))
            .and(body_string_contains("title=sky"))
            .and(body_string_contains("tags=1%2C3"))
            .and(body_string_contains("rating_direction=descending"))
            .and(body_string_contains("rating_minimum_value=2.5"))
            .and(body_string_contains("rating_maximum_value=&"))
            .and(body_string_contains("user_who_added=ann"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "filter_results": [
                    {"title": "Sky at night", "link": "/m/7/", "rating": 4.0,
                     "tags": [{"name": "night", "help_text": "Taken after dark"}]},
                    {"title": "Blue sky", "link": "/m/2/", "rating": 3, "tags": []}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let filter = MediaFilter {
            title: "sky".into(),
            tags: vec!["1".into(), "3".into()],
            rating_direction: "descending".into(),
            rating_minimum_value: Some(2.5),
            user_who_added: "ann".into(),
            ..Default::default()
        };
        let outcome = client(&server).filter("/en-us/", &filter).await.unwrap();

        let titles: Vec<&str> = outcome.results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Sky at night", "Blue sky"]);
        assert_eq!(outcome.results[0].link, "/m/7/");
        assert_eq!(outcome.results[0].tags[0].help_text, "Taken after dark");
        assert_eq!(outcome.results[1].rating, "3");
    }

    #[tokio::test]
    async fn test_filter_media_rejected_criteria() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/en-us/"))
            .and(body_string_contains("request_type=filter_media"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let filter = MediaFilter {
            rating_direction: "sideways".into(),
            ..Default::default()
        };
        let result = client(&server).filter("/en-us/", &filter).await;
        assert!(matches!(result, Err(PageError::Status { status: 400, .. })));
    }

    #[tokio::test]
    async fn test_rate_media() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PAGE))
            .and(body_string_contains("request_type=update_media_rating"))
            .and(body_string_contains("new_rating=4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result_rating": "4,2"})))
            .expect(1)
            .mount(&server)
            .await;

        let rating = client(&server).rate_media(PAGE, "12", 4).await.unwrap();
        assert_eq!(rating.as_deref(), Some("4,2"));
    }

    #[tokio::test]
    async fn test_download_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PAGE))
            .and(body_string_contains("request_type=download_file"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"downloads_number": 42})))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(client(&server).download(PAGE).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_comment_created_and_threaded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PAGE))
            .and(body_string_contains("request_type=create_comment"))
            .and(body_string_contains("parent_id=5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "comment": {"id": 6, "author": "ann", "content": "Agreed", "parent_id": 5}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server).comment(PAGE, "Agreed", Some(5)).await.unwrap();
        let ActionOutcome::Created(comment) = outcome else {
            panic!("expected a created comment");
        };

        let mut thread = CommentThread::build(Vec::new());
        thread.insert(skylibrary_uploadr::page::Comment {
            id: 5,
            author: "bob".into(),
            content: "First".into(),
            pub_date: None,
            parent_id: None,
            rating: 0,
        });
        thread.insert(comment);

        let walked: Vec<(usize, u64)> = thread.walk().into_iter().map(|(d, c)| (d, c.id)).collect();
        assert_eq!(walked, vec![(0, 5), (1, 6)]);
    }

    #[tokio::test]
    async fn test_comment_validation_messages_on_bad_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PAGE))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "messages": [{"message": "Comment is empty", "tags": "error"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server).comment(PAGE, "", None).await.unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::ValidationFailed(vec![Message {
                message: "Comment is empty".into(),
                tags: "error".into()
            }])
        );
    }

    #[tokio::test]
    async fn test_report_comment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PAGE))
            .and(body_string_contains("request_type=report_comment"))
            .and(body_string_contains("comment_id=9"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"report_success_message": "Report sent"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server).report(PAGE, 9, "spam").await.unwrap();
        assert_eq!(outcome, ActionOutcome::Reported("Report sent".into()));
    }

    #[tokio::test]
    async fn test_vote_comment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PAGE))
            .and(body_string_contains("request_type=vote_comment"))
            .and(body_string_contains("vote=down"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rating": -1})))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server).vote(PAGE, 9, Vote::Down).await.unwrap();
        assert_eq!(outcome, VoteOutcome::Counted { rating: -1 });
    }

    #[tokio::test]
    async fn test_moderator_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/en-us/moderation/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"moderator_task": ""})))
            .expect(1)
            .mount(&server)
            .await;

        let task = client(&server)
            .receive_moderator_task("/en-us/moderation/")
            .await
            .unwrap();
        assert_eq!(task, None);
    }

    #[tokio::test]
    async fn test_server_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PAGE))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let result = client(&server).download(PAGE).await;
        assert!(matches!(result, Err(PageError::Status { status: 500, .. })));
    }
}
