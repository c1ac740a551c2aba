//! Item-based collaborative filtering over per-category rating tables.

pub mod keywords;

use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{CategoryMatrix, CategoryRows, CategorySimilarity};
use crate::utils::top_k_indices;

#[derive(Debug, Clone)]
pub struct ItemBasedCollaborativeFiltering {
    pub top_n: usize,
}

impl ItemBasedCollaborativeFiltering {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    /// Pivots columnar rows into a user-by-item table.
    ///
    /// Only rows tagged with `category` are used. Repeated (user, item) pairs are
    /// averaged and absent pairs are filled with zero, so every user present in the
    /// category has a rating for every item.
    pub fn pivot(&self, category: &str, rows: &CategoryRows) -> CategoryMatrix {
        let mut sums: HashMap<(String, String), (f64, usize)> = HashMap::new();
        let mut users = BTreeSet::new();
        let mut items = BTreeSet::new();

        for i in 0..rows.len() {
            if rows.categories.get(i).map(String::as_str) != Some(category) {
                continue;
            }
            let (Some(user), Some(item), Some(rating)) =
                (rows.user_ids.get(i), rows.item_ids.get(i), rows.ratings.get(i))
            else {
                continue;
            };

            let user = user.to_string();
            let item = item.to_string();
            let entry = sums.entry((user.clone(), item.clone())).or_insert((0.0, 0));
            entry.0 += rating;
            entry.1 += 1;
            users.insert(user);
            items.insert(item);
        }

        let table = items
            .iter()
            .map(|item| {
                let column = users
                    .iter()
                    .map(|user| {
                        let rating = sums
                            .get(&(user.clone(), item.clone()))
                            .map(|(sum, count)| sum / *count as f64)
                            .unwrap_or(0.0);
                        (user.clone(), rating)
                    })
                    .collect();
                (item.clone(), column)
            })
            .collect();

        CategoryMatrix(table)
    }

    /// Cosine similarity between item columns.
    pub fn similarity(&self, matrix: &CategoryMatrix) -> CategorySimilarity {
        let items: Vec<&String> = matrix.items().collect();
        let users: Vec<&String> = matrix
            .0
            .values()
            .flat_map(|column| column.keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut ratings = DMatrix::<f64>::zeros(users.len(), items.len());
        for (col, item) in items.iter().enumerate() {
            for (row, user) in users.iter().enumerate() {
                ratings[(row, col)] = matrix.rating(user, item).unwrap_or(0.0);
            }
        }

        for mut column in ratings.column_iter_mut() {
            let norm = column.norm();
            if norm > 0.0 {
                column /= norm;
            }
        }

        let gram = ratings.transpose() * &ratings;

        let table = items
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let row = items
                    .iter()
                    .enumerate()
                    .map(|(j, b)| ((*b).clone(), gram[(i, j)]))
                    .collect::<BTreeMap<_, _>>();
                ((*a).clone(), row)
            })
            .collect();

        CategorySimilarity(table)
    }

    /// Top items for `user_id`: similarity-weighted ratings, excluding items the user
    /// already rated. Users absent from the matrix, or with nothing left to suggest,
    /// get the items with the highest mean rating instead.
    pub fn recommend(
        &self,
        user_id: &str,
        matrix: &CategoryMatrix,
        similarity: &CategorySimilarity,
    ) -> Vec<String> {
        let known_user = matrix.0.values().any(|column| column.contains_key(user_id));

        if known_user {
            let recommended = self.score_by_similarity(user_id, matrix, similarity);
            if !recommended.is_empty() {
                return recommended;
            }
        }

        self.most_popular(matrix)
    }

    fn score_by_similarity(
        &self,
        user_id: &str,
        matrix: &CategoryMatrix,
        similarity: &CategorySimilarity,
    ) -> Vec<String> {
        let items: Vec<&String> = similarity.0.keys().collect();
        if items.is_empty() {
            return Vec::new();
        }

        let sim = DMatrix::from_fn(items.len(), items.len(), |i, j| {
            similarity.score(items[i], items[j]).unwrap_or(0.0)
        });
        let user_ratings = DVector::from_fn(items.len(), |i, _| {
            matrix.rating(user_id, items[i]).unwrap_or(0.0)
        });

        let weighted = &sim * &user_ratings;
        let scores: Vec<f64> = (0..items.len())
            .map(|i| weighted[i] / sim.row(i).sum())
            .collect();

        let candidates: Vec<usize> = (0..items.len())
            .filter(|&i| user_ratings[i] <= 0.0)
            .collect();
        let candidate_scores: Vec<f64> = candidates.iter().map(|&i| scores[i]).collect();

        top_k_indices(&candidate_scores, self.top_n)
            .into_iter()
            .map(|k| items[candidates[k]].clone())
            .collect()
    }

    fn most_popular(&self, matrix: &CategoryMatrix) -> Vec<String> {
        let items: Vec<&String> = matrix.items().collect();
        let means: Vec<f64> = matrix
            .0
            .values()
            .map(|column| {
                if column.is_empty() {
                    0.0
                } else {
                    column.values().sum::<f64>() / column.len() as f64
                }
            })
            .collect();

        top_k_indices(&means, self.top_n)
            .into_iter()
            .map(|i| items[i].clone())
            .collect()
    }
}
