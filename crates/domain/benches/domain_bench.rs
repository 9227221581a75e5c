use common::UserId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    DiceValue, Duel, DuelParams, ItemId, MaxGifts, MaxPlayers, Participant, Roll, Stake,
    StakedItem, validate_entry,
};

fn user(id: i64) -> UserId {
    UserId::new(id).unwrap()
}

fn stake(user_id: i64, item: &str, value: &str) -> Stake {
    Stake::new(
        user(user_id),
        StakedItem::new(ItemId::new(item).unwrap(), item, item, value.parse().unwrap()).unwrap(),
    )
}

fn full_duel(players: u8, gifts_each: usize) -> Duel {
    let params = DuelParams::new(
        false,
        MaxPlayers::new(players).unwrap(),
        MaxGifts::new(10).unwrap(),
    );
    let mut duel = Duel::create(params, user(1), "");
    for id in 2..=i64::from(players) {
        duel.add_participant(Participant::joiner(user(id), "")).unwrap();
    }
    for id in 1..=i64::from(players) {
        for n in 0..gifts_each {
            duel.place_stake(stake(id, &format!("gift-{id}-{n}"), "1.25"))
                .unwrap();
        }
    }
    duel
}

fn bench_validate_entry(c: &mut Criterion) {
    let duel = full_duel(4, 10);

    c.bench_function("domain/validate_entry", |b| {
        b.iter(|| validate_entry(&duel, user(4)).unwrap());
    });
}

fn bench_tie_break_until_winner(c: &mut Criterion) {
    c.bench_function("domain/five_tie_rounds_then_winner", |b| {
        b.iter(|| {
            let mut duel = full_duel(4, 1);
            duel.start().unwrap();
            let six = DiceValue::new(6).unwrap();
            for _ in 0..5 {
                for id in 1..=4 {
                    duel.add_roll_to_current_round(Roll::auto(user(id), six))
                        .unwrap();
                }
                let tied = duel.evaluate_current_round().unwrap().winners();
                duel.start_round(tied).unwrap();
            }
            duel.add_roll_to_current_round(Roll::auto(user(1), six))
                .unwrap();
            for id in 2..=4 {
                duel.add_roll_to_current_round(Roll::auto(user(id), DiceValue::new(1).unwrap()))
                    .unwrap();
            }
            let winner = duel.evaluate_current_round().unwrap().winners()[0];
            duel.complete(winner).unwrap();
        });
    });
}

criterion_group!(benches, bench_validate_entry, bench_tie_break_until_winner);
criterion_main!(benches);
