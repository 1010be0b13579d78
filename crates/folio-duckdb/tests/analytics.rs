use chrono::{DateTime, Duration, Utc};
use folio_core::analytics::{AnalyticsRange, MetricDefaults, RollupBoundaries};
use folio_core::location::Location;
use folio_core::page_view::NewPageView;
use folio_duckdb::DuckDbBackend;

const DEFAULTS: MetricDefaults = MetricDefaults {
    bounce_rate: 0.35,
    avg_session_seconds: 150.0,
};

fn located(country: &str, city: Option<&str>) -> Location {
    Location {
        country: Some(country.to_string()),
        city: city.map(str::to_string),
        ..Location::default()
    }
}

fn page_view(ip: &str, path: &str, at: DateTime<Utc>, duration: Option<f64>) -> NewPageView {
    NewPageView {
        id: uuid::Uuid::new_v4().to_string(),
        visitor_ip: ip.to_string(),
        path: path.to_string(),
        title: Some("Portfolio".to_string()),
        duration_seconds: duration,
        device_type: Some("desktop".to_string()),
        browser: Some("Chrome".to_string()),
        os: Some("Linux".to_string()),
        created_at: at,
    }
}

/// Five visitors in the last week: three view one page, two view two.
async fn seed_bounce_fixture(db: &DuckDbBackend, now: DateTime<Utc>) {
    let ips = ["198.51.100.1", "198.51.100.2", "198.51.100.3", "198.51.100.4", "198.51.100.5"];
    for ip in ips {
        db.upsert_visit(ip, &located("Poland", Some("Warsaw")), None, now - Duration::hours(1))
            .await
            .expect("visit");
    }
    for ip in &ips[..3] {
        db.insert_page_view(page_view(ip, "/", now - Duration::minutes(30), None))
            .await
            .expect("page view");
    }
    for ip in &ips[3..] {
        db.insert_page_view(page_view(ip, "/", now - Duration::minutes(30), Some(30.0)))
            .await
            .expect("page view");
        db.insert_page_view(page_view(ip, "/projects", now - Duration::minutes(20), Some(90.0)))
            .await
            .expect("page view");
    }
}

#[tokio::test]
async fn bounce_rate_counts_single_view_visitors() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let now = Utc::now();
    seed_bounce_fixture(&db, now).await;

    let window = AnalyticsRange::Week.window(now);
    let overview = db
        .overview(window, RollupBoundaries::at(now), DEFAULTS)
        .await
        .expect("overview");

    assert_eq!(overview.bounce_rate, 0.6);
    assert_eq!(overview.total_visitors, 5);
    assert_eq!(overview.visitors_in_range, 5);
    assert_eq!(overview.visitors_this_week, 5);
    assert_eq!(overview.total_page_views, 7);
    assert_eq!(overview.page_views_in_range, 7);
    assert_eq!(overview.avg_session_seconds, 60.0);
}

#[tokio::test]
async fn empty_window_uses_metric_defaults() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let now = Utc::now();
    let overview = db
        .overview(AnalyticsRange::Day.window(now), RollupBoundaries::at(now), DEFAULTS)
        .await
        .expect("overview");

    assert_eq!(overview.total_visitors, 0);
    assert_eq!(overview.page_views_in_range, 0);
    assert_eq!(overview.bounce_rate, 0.35);
    assert_eq!(overview.avg_session_seconds, 150.0);
}

#[tokio::test]
async fn zero_and_missing_durations_are_ignored() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let now = Utc::now();
    db.upsert_visit("192.0.2.10", &Location::default(), None, now)
        .await
        .expect("visit");
    for duration in [None, Some(0.0), Some(20.0), Some(40.0)] {
        db.insert_page_view(page_view("192.0.2.10", "/", now - Duration::minutes(1), duration))
            .await
            .expect("page view");
    }

    let overview = db
        .overview(AnalyticsRange::Day.window(now), RollupBoundaries::at(now), DEFAULTS)
        .await
        .expect("overview");
    assert_eq!(overview.avg_session_seconds, 30.0);
}

#[tokio::test]
async fn rollups_split_by_last_visit() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let now = Utc::now();
    db.upsert_visit("192.0.2.1", &Location::default(), None, now)
        .await
        .expect("visit");
    db.upsert_visit("192.0.2.2", &Location::default(), None, now - Duration::days(3))
        .await
        .expect("visit");
    db.upsert_visit("192.0.2.3", &Location::default(), None, now - Duration::days(20))
        .await
        .expect("visit");
    db.upsert_visit("192.0.2.4", &Location::default(), None, now - Duration::days(60))
        .await
        .expect("visit");

    let window = AnalyticsRange::Week.window(now + Duration::seconds(1));
    let overview = db
        .overview(window, RollupBoundaries::at(now), DEFAULTS)
        .await
        .expect("overview");

    assert_eq!(overview.total_visitors, 4);
    assert_eq!(overview.visitors_today, 1);
    assert_eq!(overview.visitors_this_week, 2);
    assert_eq!(overview.visitors_this_month, 3);
    assert_eq!(overview.visitors_in_range, 2);
}

#[tokio::test]
async fn page_views_outside_window_are_excluded() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let now = Utc::now();
    db.upsert_visit("192.0.2.9", &Location::default(), None, now)
        .await
        .expect("visit");
    db.insert_page_view(page_view("192.0.2.9", "/old", now - Duration::days(10), None))
        .await
        .expect("old view");
    db.insert_page_view(page_view("192.0.2.9", "/new", now - Duration::hours(1), None))
        .await
        .expect("new view");

    let window = AnalyticsRange::Week.window(now);
    let overview = db
        .overview(window, RollupBoundaries::at(now), DEFAULTS)
        .await
        .expect("overview");
    assert_eq!(overview.total_page_views, 2);
    assert_eq!(overview.page_views_in_range, 1);
    assert_eq!(overview.bounce_rate, 1.0);

    let traffic = db.traffic_breakdowns(window, 10).await.expect("traffic");
    let paths: Vec<&str> = traffic.top_pages.iter().map(|p| p.path.as_str()).collect();
    assert_eq!(paths, ["/new"]);
}

#[tokio::test]
async fn visitor_breakdowns_group_by_location() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let now = Utc::now();
    db.upsert_visit("198.51.100.1", &located("Poland", Some("Warsaw")), None, now)
        .await
        .expect("visit");
    db.upsert_visit("198.51.100.2", &located("Poland", Some("Krakow")), None, now)
        .await
        .expect("visit");
    db.upsert_visit("198.51.100.3", &located("Germany", None), None, now)
        .await
        .expect("visit");
    db.upsert_visit("198.51.100.4", &Location::default(), None, now - Duration::days(40))
        .await
        .expect("visit");
    db.upsert_visit("198.51.100.4", &Location::default(), None, now)
        .await
        .expect("return visit");

    let breakdowns = db
        .visitor_breakdowns(AnalyticsRange::Week.window(now + Duration::seconds(1)), 10)
        .await
        .expect("breakdowns");

    assert_eq!(breakdowns.countries[0].value, "Poland");
    assert_eq!(breakdowns.countries[0].count, 2);
    let countries: Vec<&str> = breakdowns.countries.iter().map(|r| r.value.as_str()).collect();
    assert!(countries.contains(&"Germany"));
    assert!(countries.contains(&"Unknown"));
    assert_eq!(breakdowns.cities.iter().map(|r| r.count).sum::<i64>(), 4);
    assert_eq!(breakdowns.new_visitors, 3);
    assert_eq!(breakdowns.returning_visitors, 1);
}

#[tokio::test]
async fn past_window_splits_active_visitors_into_new_and_returning() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let now = Utc::now();
    let today = now.date_naive();

    // Seen before the window and again after it.
    db.upsert_visit("203.0.113.1", &Location::default(), None, now - Duration::days(20))
        .await
        .expect("visit");
    db.upsert_visit("203.0.113.1", &Location::default(), None, now)
        .await
        .expect("return visit");
    // First seen inside the window.
    db.upsert_visit("203.0.113.2", &Location::default(), None, now - Duration::days(7))
        .await
        .expect("visit");
    // Never active in the window.
    db.upsert_visit("203.0.113.3", &Location::default(), None, now - Duration::days(30))
        .await
        .expect("visit");

    let window = AnalyticsRange::Custom {
        start: today - Duration::days(10),
        end: today - Duration::days(5),
    }
    .window(now);
    let overview = db
        .overview(window, RollupBoundaries::at(now), DEFAULTS)
        .await
        .expect("overview");
    let breakdowns = db.visitor_breakdowns(window, 10).await.expect("breakdowns");

    assert_eq!(overview.visitors_in_range, 2);
    assert_eq!(breakdowns.new_visitors, 1);
    assert_eq!(breakdowns.returning_visitors, 1);
    assert_eq!(
        breakdowns.new_visitors + breakdowns.returning_visitors,
        overview.visitors_in_range
    );
}

#[tokio::test]
async fn breakdown_limit_caps_rows() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let now = Utc::now();
    for (i, country) in ["Poland", "Germany", "France", "Spain"].iter().enumerate() {
        db.upsert_visit(&format!("198.51.100.{}", i + 1), &located(country, None), None, now)
            .await
            .expect("visit");
    }
    let breakdowns = db
        .visitor_breakdowns(AnalyticsRange::Day.window(now + Duration::seconds(1)), 2)
        .await
        .expect("breakdowns");
    assert_eq!(breakdowns.countries.len(), 2);
}

#[tokio::test]
async fn traffic_breakdowns_rank_pages_and_devices() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let now = Utc::now();
    seed_bounce_fixture(&db, now).await;
    let mut phone = page_view("198.51.100.1", "/blog", now - Duration::minutes(5), None);
    phone.device_type = Some("mobile".to_string());
    phone.browser = None;
    db.insert_page_view(phone).await.expect("phone view");

    let window = AnalyticsRange::Week.window(now);
    let traffic = db.traffic_breakdowns(window, 10).await.expect("traffic");

    assert_eq!(traffic.top_pages[0].path, "/");
    assert_eq!(traffic.top_pages[0].views, 5);
    assert_eq!(traffic.top_pages[0].unique_visitors, 5);
    assert_eq!(traffic.devices[0].value, "desktop");
    assert_eq!(traffic.devices[0].count, 7);
    assert!(traffic.browsers.iter().any(|b| b.value == "Unknown" && b.count == 1));
    assert_eq!(traffic.daily.len(), 8);
    assert_eq!(traffic.daily.iter().map(|d| d.page_views).sum::<i64>(), 8);
}

#[tokio::test]
async fn page_view_copies_visitor_country() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let now = Utc::now();
    db.upsert_visit("198.51.100.8", &located("Wonderland", None), None, now)
        .await
        .expect("visit");

    let stored = db
        .insert_page_view(page_view("198.51.100.8", "/about", now, None))
        .await
        .expect("page view");
    assert_eq!(stored.country.as_deref(), Some("Wonderland"));

    let orphan = db
        .insert_page_view(page_view("198.51.100.9", "/about", now, None))
        .await
        .expect("orphan page view");
    assert!(orphan.country.is_none());
}

#[tokio::test]
async fn duration_update_reports_missing_rows() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let stored = db
        .insert_page_view(page_view("198.51.100.8", "/about", Utc::now(), None))
        .await
        .expect("page view");

    assert!(db.set_page_view_duration(&stored.id, 42.0).await.expect("update"));
    assert!(!db.set_page_view_duration("missing", 42.0).await.expect("update"));
}
