use chrono::{Duration, TimeZone, Utc};
use rand::{seq::SliceRandom, Rng};
use recette_api::{
    Comment, CommentId, DishDump, DishId, Reaction, ReactionId, ReactionType, Time, UserId, Uuid,
};

const NUM_USERS: usize = 8;

const NUM_ROOTS: usize = 20;
const NUM_REPLIES: usize = 60;
const NUM_DANGLING: usize = 3;
const DELETED_PERCENT: f64 = 0.1;
const COMMENT_WORD_COUNT: usize = 12;

const REACTION_PERCENT: f64 = 0.4;

fn gen_n_items<T>(n: usize, f: impl FnMut(usize) -> T) -> Vec<T> {
    (0..n).map(f).collect()
}

fn gen_comment_text() -> String {
    lipsum::lipsum_words(COMMENT_WORD_COUNT)
}

fn main() -> Result<(), serde_json::Error> {
    let mut rng = rand::thread_rng();
    let dish_id = DishId(Uuid::new_v4());
    let start = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();

    let users = gen_n_items(NUM_USERS, |_| UserId(Uuid::new_v4()));

    let mut comments: Vec<Comment> = Vec::new();
    let gen_comment = |parent: Option<&Comment>, rng: &mut rand::rngs::ThreadRng| {
        // replies always come after their parent
        let after: Time = parent.map_or(start, |p| p.created_at);
        let created_at = after + Duration::minutes(rng.gen_range(1..10_000));
        Comment {
            id: CommentId(Uuid::new_v4()),
            dish_id,
            author_id: *users.choose(rng).unwrap(),
            parent_id: parent.map(|p| p.id),
            content: gen_comment_text(),
            created_at,
            updated_at: created_at,
            is_active: !rng.gen_bool(DELETED_PERCENT),
        }
    };

    // Generate top-level comments, then replies to random earlier comments
    for _ in 0..NUM_ROOTS {
        let c = gen_comment(None, &mut rng);
        comments.push(c);
    }
    for _ in 0..NUM_REPLIES {
        let parent = comments.choose(&mut rng).unwrap().clone();
        let c = gen_comment(Some(&parent), &mut rng);
        comments.push(c);
    }

    // Generate replies whose parent the dump does not know about
    for _ in 0..NUM_DANGLING {
        let mut c = gen_comment(None, &mut rng);
        c.parent_id = Some(CommentId(Uuid::new_v4()));
        comments.push(c);
    }

    // Generate reactions, at most one per user and comment
    let mut reactions = Vec::new();
    for c in comments.iter() {
        for u in users.iter() {
            if rng.gen_bool(REACTION_PERCENT) {
                reactions.push(Reaction {
                    id: ReactionId(Uuid::new_v4()),
                    comment_id: c.id,
                    user_id: *u,
                    reaction_type: *ReactionType::ALL.choose(&mut rng).unwrap(),
                    created_at: c.created_at + Duration::minutes(rng.gen_range(1..1_000)),
                });
            }
        }
    }

    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let dump = DishDump {
        dish_id,
        comments,
        reactions,
    };
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}
