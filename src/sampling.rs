/*
 * SlimBPR
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

//! BPR triple sampling: a user, one of the user's items and an item the user has not seen.

use log::info;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use crate::error::{Result, SlimError};
use crate::interactions::InteractionStore;

pub const DEFAULT_RETRY_BUDGET: usize = 100_000;

/// Index-aligned triples, sample `n` is `(users[n], positive_items[n], negative_items[n])`.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub users: Vec<usize>,
    pub positive_items: Vec<usize>,
    pub negative_items: Vec<usize>,
}

impl Batch {

    pub fn with_capacity(batch_size: usize) -> Self {
        Batch {
            users: Vec::with_capacity(batch_size),
            positive_items: Vec::with_capacity(batch_size),
            negative_items: Vec::with_capacity(batch_size),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn push(&mut self, user: usize, positive_item: usize, negative_item: usize) {
        self.users.push(user);
        self.positive_items.push(positive_item);
        self.negative_items.push(negative_item);
    }
}

pub struct NegativeSampler<'a> {
    store: &'a InteractionStore,
    rng: XorShiftRng,
    retry_budget: usize,
    eligible_users: Vec<usize>,
    has_user_candidate: Option<bool>,
}

impl<'a> NegativeSampler<'a> {

    /// Creates a sampler, a `seed` of `None` draws the seed from the operating system.
    pub fn new(store: &'a InteractionStore, seed: Option<u64>, retry_budget: usize) -> Self {
        let rng = match seed {
            Some(seed) => XorShiftRng::seed_from_u64(seed),
            None => XorShiftRng::from_entropy(),
        };

        NegativeSampler {
            store,
            rng,
            retry_budget,
            eligible_users: Vec::new(),
            has_user_candidate: None,
        }
    }

    /// (Re)builds the index of users with positive interactions used by `sample_batch`.
    pub fn initialize_fast_sampling(&mut self) {
        info!("Initializing fast sampling");

        self.eligible_users = self.store.eligible_users();

        info!("{} of {} users have positive interactions",
            self.eligible_users.len(), self.store.num_users());
    }

    pub fn eligible_users(&self) -> &[usize] {
        &self.eligible_users
    }

    /// Draws a user uniformly at random who has seen at least one but not all items. Whether such
    /// a user exists at all is only checked on the first call.
    pub fn sample_user(&mut self) -> Result<usize> {
        let store = self.store;
        let num_users = store.num_users();
        let num_items = store.num_items();

        let has_candidate = *self.has_user_candidate.get_or_insert_with(|| {
            (0..num_users).any(|user| {
                let num_seen_items = store.seen_items(user).len();
                num_seen_items > 0 && num_seen_items < num_items
            })
        });

        if !has_candidate {
            return Err(SlimError::SamplingExhaustion(
                "no user has seen at least one and not all items".to_string()));
        }

        for _ in 0..self.retry_budget {
            let user = self.rng.gen_range(0..num_users);
            let num_seen_items = self.store.seen_items(user).len();

            if num_seen_items > 0 && num_seen_items < num_items {
                return Ok(user);
            }
        }

        Err(SlimError::SamplingExhaustion(format!(
            "no suitable user found within {} attempts", self.retry_budget)))
    }

    /// Returns a random seen item and a random unseen item for the user.
    pub fn sample_item_pair(&mut self, user: usize) -> Result<(usize, usize)> {
        let store = self.store;
        let seen_items = store.seen_items(user);

        if seen_items.is_empty() {
            return Err(SlimError::SamplingExhaustion(format!(
                "user {} has no interactions to sample a positive item from", user)));
        }

        let positive_item = seen_items[self.rng.gen_range(0..seen_items.len())];
        let negative_item = self.sample_negative(user, seen_items)?;

        Ok((positive_item, negative_item))
    }

    pub fn sample_triple(&mut self) -> Result<(usize, usize, usize)> {
        let user = self.sample_user()?;
        let (positive_item, negative_item) = self.sample_item_pair(user)?;

        Ok((user, positive_item, negative_item))
    }

    /// Draws `batch_size` users with replacement from the eligible users, and for each of them a
    /// positive item and an item outside of the user's positive items.
    pub fn sample_batch(&mut self, batch_size: usize) -> Result<Batch> {

        if self.eligible_users.is_empty() {
            return Err(SlimError::SamplingExhaustion(
                "no eligible users, fast sampling is not initialized or no interaction reaches \
                 the positive threshold".to_string()));
        }

        let store = self.store;
        let mut batch = Batch::with_capacity(batch_size);

        for _ in 0..batch_size {
            let user = self.eligible_users[self.rng.gen_range(0..self.eligible_users.len())];
            let user_seen_items = store.positive_items(user);

            let positive_item = user_seen_items[self.rng.gen_range(0..user_seen_items.len())];
            let negative_item = self.sample_negative(user, user_seen_items)?;

            batch.push(user, positive_item, negative_item);
        }

        Ok(batch)
    }

    // It's faster to just try again than to build a mapping of the non-seen items for every user
    fn sample_negative(&mut self, user: usize, seen_items: &[usize]) -> Result<usize> {
        let num_items = self.store.num_items();

        if seen_items.len() >= num_items {
            return Err(SlimError::SamplingExhaustion(format!(
                "user {} has seen all {} items, no negative item available", user, num_items)));
        }

        for _ in 0..self.retry_budget {
            let negative_item = self.rng.gen_range(0..num_items);

            if seen_items.binary_search(&negative_item).is_err() {
                return Ok(negative_item);
            }
        }

        Err(SlimError::SamplingExhaustion(format!(
            "no negative item found for user {} within {} attempts", user, self.retry_budget)))
    }
}


#[cfg(test)]
mod tests {

    use proptest::prelude::*;

    use crate::error::SlimError;
    use crate::interactions::InteractionStore;
    use crate::sampling::NegativeSampler;
    use crate::types;

    fn store(triplets: &[(u32, u32, f32)], num_users: usize, num_items: usize) -> InteractionStore {
        let train = types::new_sparse_matrix(num_users, num_items, triplets).unwrap();
        InteractionStore::new(train, 1.0).unwrap()
    }

    #[test]
    fn naive_sampling_skips_users_who_saw_everything() {
        let store = store(&[
            (0, 0, 1.0), (0, 1, 1.0), (0, 2, 1.0),
            (2, 1, 1.0),
        ], 3, 3);

        let mut sampler = NegativeSampler::new(&store, Some(42), 1_000);

        for _ in 0..100 {
            let (user, positive_item, negative_item) = sampler.sample_triple().unwrap();
            assert_eq!(user, 2);
            assert_eq!(positive_item, 1);
            assert!(negative_item == 0 || negative_item == 2);
        }
    }

    #[test]
    fn naive_sampling_fails_without_candidates() {
        let store = store(&[(0, 0, 1.0), (0, 1, 1.0)], 2, 2);
        let mut sampler = NegativeSampler::new(&store, Some(1), 1_000);

        match sampler.sample_user() {
            Err(SlimError::SamplingExhaustion(_)) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn batch_sampling_requires_eligible_users() {
        let store = store(&[(0, 0, 0.5)], 1, 2);
        let mut sampler = NegativeSampler::new(&store, Some(1), 1_000);
        sampler.initialize_fast_sampling();

        assert!(sampler.eligible_users().is_empty());

        match sampler.sample_batch(10) {
            Err(SlimError::SamplingExhaustion(_)) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn batch_sampling_fails_for_users_who_saw_everything() {
        let store = store(&[(0, 0, 1.0), (0, 1, 1.0)], 1, 2);
        let mut sampler = NegativeSampler::new(&store, Some(1), 1_000);
        sampler.initialize_fast_sampling();

        match sampler.sample_batch(1) {
            Err(SlimError::SamplingExhaustion(_)) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn naive_sampling_gives_up_after_retry_budget() {
        // only the last of 50 users has seen something, a budget of 1 draws one user
        let store = store(&[(49, 0, 1.0)], 50, 2);

        let num_failures = (0..20u64)
            .filter(|seed| {
                let mut sampler = NegativeSampler::new(&store, Some(*seed), 1);
                match sampler.sample_user() {
                    Ok(user) => {
                        assert_eq!(user, 49);
                        false
                    },
                    Err(SlimError::SamplingExhaustion(_)) => true,
                    Err(other) => panic!("unexpected error {:?}", other),
                }
            })
            .count();

        assert!(num_failures > 0);
    }

    #[test]
    fn naive_sampling_fails_with_zero_retry_budget() {
        let store = store(&[(0, 0, 1.0)], 1, 2);
        let mut sampler = NegativeSampler::new(&store, Some(3), 0);

        match sampler.sample_user() {
            Err(SlimError::SamplingExhaustion(message)) => assert!(message.contains("attempts")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn batch_sampling_gives_up_after_retry_budget() {
        // the single user has 199 of 200 items as positives, item 199 is the only negative
        let triplets: Vec<(u32, u32, f32)> = (0..199).map(|item| (0, item, 1.0)).collect();
        let store = store(&triplets, 1, 200);

        let mut num_failures = 0;
        for seed in 0..20u64 {
            let mut sampler = NegativeSampler::new(&store, Some(seed), 1);
            sampler.initialize_fast_sampling();

            match sampler.sample_batch(1) {
                Ok(batch) => assert_eq!(batch.negative_items, vec![199]),
                Err(SlimError::SamplingExhaustion(message)) => {
                    assert!(message.contains("attempts"));
                    num_failures += 1;
                },
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }

        assert!(num_failures > 0);
    }

    #[test]
    fn same_seed_same_batches() {
        let store = store(&[
            (0, 0, 1.0), (0, 3, 1.0), (1, 1, 1.0), (2, 2, 1.0), (2, 4, 1.0),
        ], 3, 5);

        let mut sampler_a = NegativeSampler::new(&store, Some(7), 1_000);
        let mut sampler_b = NegativeSampler::new(&store, Some(7), 1_000);
        sampler_a.initialize_fast_sampling();
        sampler_b.initialize_fast_sampling();

        for _ in 0..10 {
            assert_eq!(sampler_a.sample_batch(16).unwrap(), sampler_b.sample_batch(16).unwrap());
        }
    }

    fn interactions() -> impl Strategy<Value = (usize, usize, Vec<(u32, u32, f32)>)> {
        (1usize..6, 2usize..8).prop_flat_map(|(num_users, num_items)| {
            let triplets = prop::collection::vec(
                (0..num_users as u32, 0..num_items as u32, 0.0f32..5.0f32),
                1..(num_users * num_items),
            );
            (Just(num_users), Just(num_items), triplets)
        })
    }

    proptest! {
        #[test]
        fn sampled_triples_respect_seen_items(
            (num_users, num_items, triplets) in interactions(),
            seed in any::<u64>(),
            batch_size in 1usize..32,
        ) {
            let train = types::new_sparse_matrix(num_users, num_items, &triplets).unwrap();
            let store = InteractionStore::new(train, 2.0).unwrap();

            let mut sampler = NegativeSampler::new(&store, Some(seed), 10_000);
            sampler.initialize_fast_sampling();

            let can_sample = sampler.eligible_users().iter()
                .all(|user| store.positive_items(*user).len() < num_items);

            prop_assume!(!sampler.eligible_users().is_empty() && can_sample);

            let batch = sampler.sample_batch(batch_size).unwrap();

            prop_assert_eq!(batch.len(), batch_size);
            prop_assert_eq!(batch.positive_items.len(), batch_size);
            prop_assert_eq!(batch.negative_items.len(), batch_size);

            for n in 0..batch.len() {
                let user = batch.users[n];
                prop_assert!(store.is_positive(user, batch.positive_items[n]));
                prop_assert!(!store.is_positive(user, batch.negative_items[n]));
                prop_assert!(batch.negative_items[n] < num_items);
            }
        }
    }
}
