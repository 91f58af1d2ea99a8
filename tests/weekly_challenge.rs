use bfabot_core::{Db, Division, Error, StudentUpdate};

#[tokio::test]
async fn week_of_submissions() {
    let db = Db::in_memory().await.unwrap();
    let (week, closed) = db.start_new_week(None, "week1").await.unwrap();
    assert_eq!(closed, None);
    assert_eq!(week.week, 1);
    assert!(week.is_open);

    assert_eq!(db.submit_score(42, "Alice", Division::Freshman, 100, "url1").await.unwrap(), None);
    assert_eq!(db.submit_score(42, "Alice", Division::Freshman, 150, "url2").await.unwrap(), Some(50));
    assert_eq!(db.submit_score(42, "Alice", Division::Freshman, 90, "url3").await.unwrap(), Some(-60));

    let subs = db.recent_submissions(42, 10).await.unwrap();
    assert_eq!(subs.len(), 3);
    assert!(subs.iter().all(|s| s.week == 1 && s.member_id == 42));

    let mut urls: Vec<&str> = subs.iter().map(|s| s.pic_url.as_str()).collect();
    urls.sort();
    assert_eq!(urls, vec!["url1", "url2", "url3"]);
}

#[tokio::test]
async fn season_lifecycle() {
    let db = Db::in_memory().await.unwrap();
    assert!(matches!(
        db.submit_score(1, "a#1", Division::Varsity, 10, "x").await,
        Err(Error::NoActiveChallenge)
    ));

    db.start_new_week(None, "week1").await.unwrap();
    db.submit_score(1, "a#1", Division::Varsity, 500, "x").await.unwrap();

    let closed = db.close_submissions().await.unwrap().unwrap();
    assert_eq!((closed.week, closed.is_open), (1, false));
    assert!(matches!(
        db.submit_score(1, "a#1", Division::Varsity, 600, "x").await,
        Err(Error::SubmissionsClosed(1))
    ));

    assert!(matches!(db.start_new_week(Some(1), "again").await, Err(Error::DuplicateWeek(1))));

    let (week2, closed) = db.start_new_week(None, "week2").await.unwrap();
    assert_eq!(week2.week, 2);
    assert_eq!(closed, None, "week 1 was already closed");
    assert_eq!(db.submit_score(1, "a#1", Division::Varsity, 100, "x").await.unwrap(), None);

    let board = db.leaderboard(1).await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].best, 500);
}

#[tokio::test]
async fn database_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.db");
    let path = path.to_str().unwrap();

    let db = Db::open(path).await.unwrap();
    db.start_new_week(None, "week1").await.unwrap();
    db.submit_score(9, "z#9", Division::Graduate, 77, "x").await.unwrap();
    db.checkpoint().await.unwrap();
    db.close().await;

    let db = Db::open(path).await.unwrap();
    assert_eq!(db.latest_week().await.unwrap(), Some(1));
    assert_eq!(db.personal_best(9, 1).await.unwrap(), Some(77));
    db.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_new_weeks_pick_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.db");
    let db = Db::open(path.to_str().unwrap()).await.unwrap();
    db.start_new_week(Some(4), "week4").await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let db = db.clone();
            tokio::spawn(async move { db.start_new_week(Some(5), &format!("week5 #{i}")).await })
        })
        .collect();

    let mut started = 0;
    for t in tasks {
        match t.await.unwrap() {
            Ok((c, _)) => {
                assert_eq!(c.week, 5);
                started += 1;
            }
            Err(Error::DuplicateWeek(5)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(started, 1);
    assert!(!db.challenge(4).await.unwrap().unwrap().is_open);
    assert!(db.is_latest_week_open().await.unwrap());
    db.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_profile_updates_share_one_student() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.db");
    let db = Db::open(path.to_str().unwrap()).await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let db = db.clone();
            tokio::spawn(async move {
                db.upsert_student(77, StudentUpdate {
                    nickname: Some(format!("dancer{i}")),
                    ..Default::default()
                }).await
            })
        })
        .collect();

    for t in tasks {
        t.await.unwrap().unwrap();
    }

    let students: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students;")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(students, 1);
    assert!(db.student(77).await.unwrap().unwrap().nickname.unwrap().starts_with("dancer"));
    db.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_are_all_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.db");
    let db = Db::open(path.to_str().unwrap()).await.unwrap();
    db.start_new_week(None, "week1").await.unwrap();

    let tasks: Vec<_> = (1..=8u32)
        .map(|score| {
            let db = db.clone();
            tokio::spawn(async move {
                db.submit_score(42, "alice#0001", Division::Freshman, score * 100, "url").await
            })
        })
        .collect();

    let mut firsts = 0;
    for t in tasks {
        if t.await.unwrap().unwrap().is_none() { firsts += 1; }
    }

    assert_eq!(firsts, 1);
    assert_eq!(db.submission_count(42).await.unwrap(), 8);
    assert_eq!(db.personal_best(42, 1).await.unwrap(), Some(800));
    db.close().await;
}
