use fieldwatch::{
    models::{PublicUser, Report},
    pagination::{
        fold_case, paginate, PageParams, PageRequest, Paginate, PaginationError, SortOrder,
        MAX_PER_PAGE,
    },
    services::team_service::TeamService,
    test_utils::test_helpers,
};
use sqlx::SqlitePool;

async fn seed_reports(pool: &SqlitePool, user_id: i64) {
    for i in 0..23 {
        let title = if i % 3 == 0 { "Suspect" } else { "Civilian" };
        test_helpers::insert_test_report(pool, user_id, title, i)
            .await
            .unwrap();
    }
}

async fn insert_named_user(pool: &SqlitePool, email: &str, first: &str, last: &str) {
    sqlx::query(
        "INSERT INTO users (email, first_name, last_name, first_name_folded, last_name_folded) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(email)
    .bind(first)
    .bind(last)
    .bind(fold_case(first))
    .bind(fold_case(last))
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_pages_cover_every_record_exactly_once() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let user_id = test_helpers::insert_test_user(&pool, "pager@example.com", "password123", true)
        .await
        .unwrap();
    seed_reports(&pool, user_id).await;

    let first = paginate::<Report>(&pool, &PageRequest::new(1, 5)).await.unwrap();
    assert_eq!(first.total, 23);
    assert_eq!(first.pages, 5);

    let mut seen = Vec::new();
    for page_number in 1..=first.pages {
        let page = paginate::<Report>(&pool, &PageRequest::new(page_number, 5))
            .await
            .unwrap();
        seen.extend(page.items.into_iter().map(|r| r.id));
    }

    assert_eq!(seen.len() as i64, first.total);
    let mut unique = seen.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), seen.len());
}

#[tokio::test]
async fn test_filtered_pages_cover_every_match_exactly_once() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let user_id = test_helpers::insert_test_user(&pool, "pager@example.com", "password123", true)
        .await
        .unwrap();
    seed_reports(&pool, user_id).await;

    let request = |page| {
        PageRequest::new(page, 3)
            .with_search("civil", &["title"])
            .with_sort("title", SortOrder::Asc)
    };
    let first = paginate::<Report>(&pool, &request(1)).await.unwrap();
    assert_eq!(first.total, 15);
    assert_eq!(first.pages, 5);

    let mut seen = Vec::new();
    for page_number in 1..=first.pages {
        let page = paginate::<Report>(&pool, &request(page_number)).await.unwrap();
        assert!(page.items.iter().all(|r| r.title == "Civilian"));
        seen.extend(page.items.into_iter().map(|r| r.id));
    }

    assert_eq!(seen.len() as i64, first.total);
    let mut unique = seen.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), seen.len());
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let user_id = test_helpers::insert_test_user(&pool, "pager@example.com", "password123", true)
        .await
        .unwrap();
    seed_reports(&pool, user_id).await;

    let page = paginate::<Report>(&pool, &PageRequest::new(9, 5)).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 23);
    assert!(!page.has_next());
}

#[tokio::test]
async fn test_empty_table_has_zero_pages() {
    let pool = test_helpers::create_test_db().await.unwrap();

    let page = paginate::<Report>(&pool, &PageRequest::default()).await.unwrap();
    assert_eq!(page.total, 0);
    assert_eq!(page.pages, 0);
    assert!(page.items.is_empty());
    assert!(page.page_numbers().is_empty());
}

#[tokio::test]
async fn test_per_page_is_clamped_to_maximum() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let user_id = test_helpers::insert_test_user(&pool, "pager@example.com", "password123", true)
        .await
        .unwrap();
    seed_reports(&pool, user_id).await;

    let request = PageRequest {
        per_page: 100_000,
        ..PageRequest::default()
    };
    let page = paginate::<Report>(&pool, &request).await.unwrap();
    assert_eq!(page.per_page, MAX_PER_PAGE);
    assert_eq!(page.items.len(), 23);
}

#[tokio::test]
async fn test_search_is_case_insensitive_substring() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let user_id = test_helpers::insert_test_user(&pool, "pager@example.com", "password123", true)
        .await
        .unwrap();
    seed_reports(&pool, user_id).await;

    let request = PageRequest::new(1, 50).with_search("SUSP", &[]);
    let page = paginate::<Report>(&pool, &request).await.unwrap();
    assert_eq!(page.total, 8);
    assert!(page.items.iter().all(|r| r.title == "Suspect"));
}

#[tokio::test]
async fn test_search_ors_across_fields() {
    let pool = test_helpers::create_test_db().await.unwrap();
    insert_named_user(&pool, "alice@example.com", "Alice", "Martin").await;
    insert_named_user(&pool, "bob@example.com", "Bob", "Alison").await;
    insert_named_user(&pool, "carol@example.com", "Carol", "Smith").await;

    let request = PageRequest::new(1, 10).with_search("ali", &[]);
    let page = paginate::<PublicUser>(&pool, &request).await.unwrap();
    let mut emails: Vec<String> = page.items.into_iter().map(|u| u.email).collect();
    emails.sort();
    assert_eq!(emails, vec!["alice@example.com", "bob@example.com"]);

    let request = PageRequest::new(1, 10).with_search("ali", &["first_name"]);
    let page = paginate::<PublicUser>(&pool, &request).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].first_name, "Alice");
}

#[tokio::test]
async fn test_search_folds_accented_capitals() {
    let pool = test_helpers::create_test_db().await.unwrap();
    insert_named_user(&pool, "emile@example.com", "Émile", "Ørsted").await;
    insert_named_user(&pool, "other@example.com", "Emma", "Smith").await;

    for text in ["Émile", "ÉMILE", "émile", "mIL"] {
        let request = PageRequest::new(1, 10).with_search(text, &["first_name"]);
        let page = paginate::<PublicUser>(&pool, &request).await.unwrap();
        assert_eq!(page.total, 1, "{text}");
        assert_eq!(page.items[0].first_name, "Émile");
    }

    let request = PageRequest::new(1, 10).with_search("ørs", &[]);
    let page = paginate::<PublicUser>(&pool, &request).await.unwrap();
    assert_eq!(page.total, 1);

    let user_id = test_helpers::insert_test_user(&pool, "pager@example.com", "password123", true)
        .await
        .unwrap();
    test_helpers::insert_test_report(&pool, user_id, "Écoles bombardées", 0)
        .await
        .unwrap();
    let request = PageRequest::new(1, 10).with_search("ÉCOLES", &[]);
    let page = paginate::<Report>(&pool, &request).await.unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn test_team_listing_omits_credentials() {
    assert!(!PublicUser::COLUMNS.contains("password_hash"));

    let pool = test_helpers::create_test_db().await.unwrap();
    let user_id = test_helpers::insert_test_user(&pool, "member@example.com", "password123", true)
        .await
        .unwrap();
    test_helpers::insert_test_report(&pool, user_id, "Civilian", 0)
        .await
        .unwrap();

    let team = TeamService::new(pool);
    let page = team
        .members_page(&PageRequest::new(1, 10).with_search("TEST", &["first_name"]))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].user.email, "member@example.com");
    assert_eq!(page.items[0].report_count, 1);

    let json = serde_json::to_value(&page.items[0]).unwrap();
    assert!(json["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_like_wildcards_are_literal() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let user_id = test_helpers::insert_test_user(&pool, "pager@example.com", "password123", true)
        .await
        .unwrap();
    seed_reports(&pool, user_id).await;
    test_helpers::insert_test_report(&pool, user_id, "100% sure", 0)
        .await
        .unwrap();

    let request = PageRequest::new(1, 50).with_search("%", &[]);
    let page = paginate::<Report>(&pool, &request).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].title, "100% sure");
}

#[tokio::test]
async fn test_sorting_by_declared_field() {
    let pool = test_helpers::create_test_db().await.unwrap();
    insert_named_user(&pool, "b@example.com", "Bea", "Young").await;
    insert_named_user(&pool, "a@example.com", "Cid", "Xu").await;
    insert_named_user(&pool, "c@example.com", "Abe", "Zed").await;

    let request = PageRequest::new(1, 10).with_sort("email", SortOrder::Asc);
    let page = paginate::<PublicUser>(&pool, &request).await.unwrap();
    let emails: Vec<&str> = page.items.iter().map(|u| u.email.as_str()).collect();
    assert_eq!(emails, vec!["a@example.com", "b@example.com", "c@example.com"]);

    let request = PageRequest::new(1, 10).with_sort("first_name", SortOrder::Desc);
    let page = paginate::<PublicUser>(&pool, &request).await.unwrap();
    assert_eq!(page.items[0].first_name, "Cid");
}

#[tokio::test]
async fn test_unknown_fields_are_rejected() {
    let pool = test_helpers::create_test_db().await.unwrap();

    let request = PageRequest::new(1, 10).with_sort("password_hash", SortOrder::Asc);
    let err = paginate::<PublicUser>(&pool, &request).await.unwrap_err();
    assert!(matches!(err, PaginationError::UnknownSortField(ref f) if f == "password_hash"));
    assert!(err.is_client_error());

    let request = PageRequest::new(1, 10).with_search("x", &["password_hash"]);
    let err = paginate::<PublicUser>(&pool, &request).await.unwrap_err();
    assert!(matches!(err, PaginationError::UnknownSearchField(_)));
}

#[tokio::test]
async fn test_params_with_bad_sort_order_are_rejected() {
    let params = PageParams {
        sort_order: Some("sideways".to_string()),
        ..PageParams::default()
    };
    assert!(matches!(
        PageRequest::from_params(&params),
        Err(PaginationError::UnknownSortOrder(_))
    ));
}
