//! Integration tests for the Postgres content catalog.

mod common;

use chrono::{Duration, Utc};
use common::{create_post_input, create_test_post, unique, TestHarness};
use poster_core::domains::posts::models::{Media, Post, PostFilters, Source, Tag};
use poster_core::kernel::{BaseCatalog, BasePostStore, PgPostStore};
use test_context::test_context;

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn test_create_post_links_tags_sources_and_media(ctx: &TestHarness) {
    let tag = unique("news");
    let source = unique("Telegram");
    let first = Media::create("image/png", "s3://bucket/a.png", &ctx.db_pool).await.unwrap();
    let second = Media::create("video/mp4", "s3://bucket/b.mp4", &ctx.db_pool).await.unwrap();

    let mut input = create_post_input("With media", Utc::now(), &[&tag, "zeta", &tag], &[&source]);
    input.media_ids = vec![second.id, first.id];
    let post = Post::create(input, &ctx.db_pool).await.unwrap();

    assert_eq!(post.title, "With media");
    assert_eq!(post.tags, {
        let mut expected = vec![tag.clone(), "zeta".to_string()];
        expected.sort();
        expected
    });
    assert_eq!(post.sources, vec![source.clone()]);
    assert_eq!(post.media, vec![second, first]);

    let loaded = Post::find_by_id(post.id, &ctx.db_pool).await.unwrap().unwrap();
    assert_eq!(loaded, post);

    let tags = Tag::find_all(&ctx.db_pool).await.unwrap();
    assert!(tags.iter().any(|t| t.tag == tag));
    let sources = Source::find_all(&ctx.db_pool).await.unwrap();
    assert!(sources.iter().any(|s| s.source == source));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn test_find_published_window_order_and_paging(ctx: &TestHarness) {
    let tag = unique("window");
    let now = Utc::now();

    create_test_post(&ctx.db_pool, "too old", now - Duration::hours(3), &[&tag], &[])
        .await
        .unwrap();
    create_test_post(&ctx.db_pool, "future", now + Duration::hours(1), &[&tag], &[]).await.unwrap();
    for minutes in [5, 15, 25] {
        let title = format!("due {}", minutes);
        let publish_date = now - Duration::minutes(minutes);
        create_test_post(&ctx.db_pool, &title, publish_date, &[&tag], &[])
            .await
            .unwrap();
    }

    let filters = PostFilters {
        published_from: Some(now - Duration::minutes(30)),
        tags: vec![tag.clone()],
        ..PostFilters::default()
    };

    let first_page = Post::find_published(&filters, 0, 2, &ctx.db_pool).await.unwrap();
    let second_page = Post::find_published(&filters, 2, 2, &ctx.db_pool).await.unwrap();

    let titles: Vec<&str> = first_page.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["due 5", "due 15"]);
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].title, "due 25");

    let ending_earlier = PostFilters {
        published_to: Some(now - Duration::minutes(10)),
        ..filters
    };
    let titles: Vec<String> = Post::find_published(&ending_earlier, 0, 10, &ctx.db_pool)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.title)
        .collect();
    assert_eq!(titles, vec!["due 15", "due 25"]);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn test_find_published_title_and_source_filters(ctx: &TestHarness) {
    let tag = unique("filters");
    let source = unique("Site");
    let past = Utc::now() - Duration::minutes(1);

    create_test_post(&ctx.db_pool, "Weekly Digest", past, &[&tag], &[&source]).await.unwrap();
    create_test_post(&ctx.db_pool, "Daily digest", past, &[&tag], &[]).await.unwrap();
    create_test_post(&ctx.db_pool, "Announcement", past, &[&tag], &[&source]).await.unwrap();

    let by_title = PostFilters {
        title: Some("DIGEST".to_string()),
        tags: vec![tag.clone()],
        ..PostFilters::default()
    };
    assert_eq!(Post::find_published(&by_title, 0, 10, &ctx.db_pool).await.unwrap().len(), 2);

    let by_source = PostFilters {
        sources: vec![source.clone()],
        ..PostFilters::default()
    };
    let mut titles: Vec<String> = Post::find_published(&by_source, 0, 10, &ctx.db_pool)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.title)
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["Announcement", "Weekly Digest"]);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn test_pg_post_store_implements_collaborators(ctx: &TestHarness) {
    let store = PgPostStore::new(ctx.db_pool.clone());
    let tag = unique("store");

    let publish_date = Utc::now() - Duration::minutes(1);
    let input = create_post_input("Through the store", publish_date, &[&tag], &[]);
    let post = store.create_post(input).await.unwrap();

    let filters = PostFilters {
        tags: vec![tag.clone()],
        ..PostFilters::default()
    };
    let found = store.find_published(&filters, 0, 10).await.unwrap();
    assert_eq!(found, vec![post]);
    assert!(store.list_tags().await.unwrap().contains(&tag));
}
