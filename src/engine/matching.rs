use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::delivery::{DeliveryRequest, DeliveryStatus, RequestStatus};
use crate::models::review::Review;
use crate::models::trip::{TravelerTrip, TripStatus};

const BASE_SCORE: f64 = 100.0;
const RATING_WEIGHT: f64 = 2.0;

#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate {
    pub request_id: Uuid,
    pub trip_id: Uuid,
    pub score: f64,
}

/// Deterministic matcher over a snapshot of open requests and active trips.
/// Same snapshot in, same ordering out: sorted by score, then earliest trip
/// date, then trip and request ids. Read-only; the caller acts on a match
/// through the lifecycle operations.
pub fn find_matches(
    requests: &[DeliveryRequest],
    trips: &[TravelerTrip],
    ratings: &HashMap<Uuid, f64>,
) -> Vec<MatchCandidate> {
    let mut scored: Vec<(MatchCandidate, DateTime<Utc>)> = Vec::new();

    for request in requests
        .iter()
        .filter(|r| r.status == DeliveryStatus::Posted && r.request_status == RequestStatus::None)
    {
        for trip in trips
            .iter()
            .filter(|t| t.status == TripStatus::Active && t.available_weight_kg > 0.0)
        {
            if !is_candidate(request, trip) {
                continue;
            }

            let rating = ratings.get(&trip.traveler).copied().unwrap_or(0.0);
            let candidate = MatchCandidate {
                request_id: request.id,
                trip_id: trip.id,
                score: BASE_SCORE + RATING_WEIGHT * rating,
            };
            scored.push((candidate, trip.travel_date));
        }
    }

    scored.sort_by(|(a, a_date), (b, b_date)| {
        b.score
            .total_cmp(&a.score)
            .then(a_date.cmp(b_date))
            .then(a.trip_id.cmp(&b.trip_id))
            .then(a.request_id.cmp(&b.request_id))
    });

    scored.into_iter().map(|(candidate, _)| candidate).collect()
}

/// A trip can carry a request when the route matches in either direction,
/// capacity covers the weight, and the trip departs before the deadline.
pub fn is_candidate(request: &DeliveryRequest, trip: &TravelerTrip) -> bool {
    route_matches(request, trip)
        && trip.available_weight_kg >= request.weight_kg
        && trip.travel_date <= request.deadline
}

fn route_matches(request: &DeliveryRequest, trip: &TravelerTrip) -> bool {
    let forward = eq_place(&trip.origin, &request.origin) && eq_place(&trip.destination, &request.destination);
    let reverse = eq_place(&trip.origin, &request.destination) && eq_place(&trip.destination, &request.origin);
    forward || reverse
}

fn eq_place(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Mean rating per reviewee, for the matcher's secondary key.
pub fn mean_ratings<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> HashMap<Uuid, f64> {
    let mut sums: HashMap<Uuid, (u32, u32)> = HashMap::new();
    for review in reviews {
        let entry = sums.entry(review.reviewee).or_insert((0, 0));
        entry.0 += u32::from(review.rating);
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(user, (total, count))| (user, f64::from(total) / f64::from(count)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::{find_matches, mean_ratings};
    use crate::models::delivery::{
        self, DeliveryRequest, DeliveryStatus, RequestStatus, SettlementState, StatusTimestamps,
    };
    use crate::models::review::Review;
    use crate::models::trip::{TravelerTrip, TripStatus};

    fn request(id_seed: u128, origin: &str, destination: &str, weight_kg: f64) -> DeliveryRequest {
        let now = Utc::now();
        let mut status_timestamps = StatusTimestamps::default();
        status_timestamps.stamp(DeliveryStatus::Posted, now);

        DeliveryRequest {
            id: Uuid::from_u128(id_seed),
            tracking_id: delivery::new_tracking_id(),
            sender: Uuid::from_u128(id_seed + 1000),
            title: "parcel".to_string(),
            description: None,
            origin: origin.to_string(),
            origin_address: None,
            destination: destination.to_string(),
            destination_address: None,
            weight_kg,
            deadline: now + Duration::days(3),
            cost: 50,
            status: DeliveryStatus::Posted,
            request_status: RequestStatus::None,
            requested_by: None,
            traveler: None,
            trip: None,
            status_timestamps,
            path: delivery::default_path(origin, destination),
            total_estimated_minutes: delivery::DEFAULT_TOTAL_MINUTES,
            settlement: SettlementState::None,
            created_at: now,
        }
    }

    fn trip(
        id_seed: u128,
        traveler_seed: u128,
        origin: &str,
        destination: &str,
        available_kg: f64,
        days_out: i64,
    ) -> TravelerTrip {
        TravelerTrip {
            id: Uuid::from_u128(id_seed),
            traveler: Uuid::from_u128(traveler_seed),
            origin: origin.to_string(),
            destination: destination.to_string(),
            travel_date: Utc::now() + Duration::days(days_out),
            max_weight_kg: available_kg,
            available_weight_kg: available_kg,
            cost_per_kg: 10,
            description: None,
            status: TripStatus::Active,
            in_flight: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn matches_same_route_within_capacity_and_deadline() {
        let requests = vec![request(1, "Dhaka", "Sylhet", 5.0)];
        let trips = vec![trip(10, 20, "Dhaka", "Sylhet", 20.0, 1)];

        let matches = find_matches(&requests, &trips, &HashMap::new());

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].request_id, requests[0].id);
        assert_eq!(matches[0].trip_id, trips[0].id);
        assert_eq!(matches[0].score, 100.0);
    }

    #[test]
    fn reverse_route_is_accepted() {
        let requests = vec![request(1, "Dhaka", "Sylhet", 5.0)];
        let trips = vec![trip(10, 20, "Sylhet", "Dhaka", 20.0, 1)];

        let matches = find_matches(&requests, &trips, &HashMap::new());
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn route_comparison_ignores_case_and_padding() {
        let requests = vec![request(1, " dhaka ", "SYLHET", 5.0)];
        let trips = vec![trip(10, 20, "Dhaka", "Sylhet", 20.0, 1)];

        let matches = find_matches(&requests, &trips, &HashMap::new());
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn overweight_and_late_trips_are_filtered_out() {
        let requests = vec![request(1, "Dhaka", "Sylhet", 5.0)];
        let trips = vec![
            trip(10, 20, "Dhaka", "Sylhet", 3.0, 1),
            trip(11, 21, "Dhaka", "Sylhet", 20.0, 30),
            trip(12, 22, "Dhaka", "Khulna", 20.0, 1),
        ];

        let matches = find_matches(&requests, &trips, &HashMap::new());
        assert!(matches.is_empty());
    }

    #[test]
    fn already_negotiating_requests_are_not_matched() {
        let mut req = request(1, "Dhaka", "Sylhet", 5.0);
        req.request_status = RequestStatus::Requested;
        let trips = vec![trip(10, 20, "Dhaka", "Sylhet", 20.0, 1)];

        let matches = find_matches(&[req], &trips, &HashMap::new());
        assert!(matches.is_empty());
    }

    #[test]
    fn higher_rated_traveler_ranks_first() {
        let requests = vec![request(1, "Dhaka", "Sylhet", 5.0)];
        let trips = vec![
            trip(10, 20, "Dhaka", "Sylhet", 20.0, 1),
            trip(11, 21, "Dhaka", "Sylhet", 20.0, 2),
        ];
        let mut ratings = HashMap::new();
        ratings.insert(Uuid::from_u128(21), 5.0);

        let matches = find_matches(&requests, &trips, &ratings);

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].trip_id, Uuid::from_u128(11));
        assert_eq!(matches[0].score, 110.0);
        assert_eq!(matches[1].score, 100.0);
    }

    #[test]
    fn equal_scores_break_ties_by_earliest_trip_date() {
        let requests = vec![request(1, "Dhaka", "Sylhet", 5.0)];
        let trips = vec![
            trip(10, 20, "Dhaka", "Sylhet", 20.0, 2),
            trip(11, 21, "Dhaka", "Sylhet", 20.0, 1),
        ];

        let matches = find_matches(&requests, &trips, &HashMap::new());
        assert_eq!(matches[0].trip_id, Uuid::from_u128(11));
    }

    #[test]
    fn identical_snapshot_yields_identical_ordering() {
        let requests = vec![
            request(1, "Dhaka", "Sylhet", 5.0),
            request(2, "Dhaka", "Sylhet", 2.0),
        ];
        let trips = vec![
            trip(10, 20, "Dhaka", "Sylhet", 20.0, 1),
            trip(11, 21, "Sylhet", "Dhaka", 20.0, 1),
        ];
        let mut ratings = HashMap::new();
        ratings.insert(Uuid::from_u128(20), 4.0);

        let first = find_matches(&requests, &trips, &ratings);
        let second = find_matches(&requests, &trips, &ratings);

        let pairs =
            |v: &[super::MatchCandidate]| v.iter().map(|m| (m.request_id, m.trip_id)).collect::<Vec<_>>();
        assert_eq!(pairs(&first), pairs(&second));
    }

    #[test]
    fn mean_ratings_averages_per_reviewee() {
        let reviewee = Uuid::from_u128(7);
        let review = |rating| Review {
            id: Uuid::new_v4(),
            request: Uuid::new_v4(),
            reviewer: Uuid::new_v4(),
            reviewee,
            rating,
            comment: None,
            created_at: Utc::now(),
        };
        let reviews = vec![review(5), review(4)];

        let ratings = mean_ratings(reviews.iter());
        assert_eq!(ratings[&reviewee], 4.5);
    }
}
