use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::models::{
    Booking, BookingSnapshot, BookingStatus, BookingSummary, Bus, BusClass, BusStop, Gender,
    Money, Passenger, PaymentEvent, PaymentProof, PaymentStatus, Route, Schedule, ScheduleDetail,
    Seat, SeatStatus, SeatType, User,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_ts(dt: &DateTime<Utc>) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

// ── Users ──

const USER_COLUMNS: &str = "id, first_name, last_name, age, email, phone, password_hash, next_of_kin_name, next_of_kin_phone, registered_at";

/// Returns false when the email is already registered.
pub fn insert_user(conn: &Connection, user: &User) -> anyhow::Result<bool> {
    let count = conn.execute(
        "INSERT OR IGNORE INTO users (id, first_name, last_name, age, email, phone, password_hash, next_of_kin_name, next_of_kin_phone, registered_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            user.id,
            user.first_name,
            user.last_name,
            user.age,
            user.email,
            user.phone,
            user.password_hash,
            user.next_of_kin_name,
            user.next_of_kin_phone,
            format_ts(&user.registered_at),
        ],
    )?;
    Ok(count > 0)
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

/// Email comparison is case-insensitive (the column is `COLLATE NOCASE`).
pub fn get_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email.trim()],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

fn parse_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let registered_at: String = row.get(9)?;
    Ok(User {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        age: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        password_hash: row.get(6)?,
        next_of_kin_name: row.get(7)?,
        next_of_kin_phone: row.get(8)?,
        registered_at: parse_ts(&registered_at),
    })
}

// ── Routes ──

pub fn insert_route(conn: &Connection, route: &Route) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO routes (id, source, destination, distance_km, estimated_time) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            route.id,
            route.source,
            route.destination,
            route.distance_km,
            route.estimated_time,
        ],
    )?;
    Ok(())
}

pub fn list_routes(conn: &Connection) -> anyhow::Result<Vec<Route>> {
    let mut stmt = conn.prepare(
        "SELECT id, source, destination, distance_km, estimated_time FROM routes ORDER BY source ASC, destination ASC",
    )?;
    let rows = stmt.query_map([], parse_route_row)?;

    let mut routes = vec![];
    for row in rows {
        routes.push(row?);
    }
    Ok(routes)
}

pub fn get_route(conn: &Connection, id: &str) -> anyhow::Result<Option<Route>> {
    let route = conn
        .query_row(
            "SELECT id, source, destination, distance_km, estimated_time FROM routes WHERE id = ?1",
            params![id],
            parse_route_row,
        )
        .optional()?;
    Ok(route)
}

pub fn find_route(
    conn: &Connection,
    source: &str,
    destination: &str,
) -> anyhow::Result<Option<Route>> {
    let route = conn
        .query_row(
            "SELECT id, source, destination, distance_km, estimated_time FROM routes
             WHERE source = ?1 COLLATE NOCASE AND destination = ?2 COLLATE NOCASE",
            params![source.trim(), destination.trim()],
            parse_route_row,
        )
        .optional()?;
    Ok(route)
}

fn parse_route_row(row: &rusqlite::Row) -> rusqlite::Result<Route> {
    Ok(Route {
        id: row.get(0)?,
        source: row.get(1)?,
        destination: row.get(2)?,
        distance_km: row.get(3)?,
        estimated_time: row.get(4)?,
    })
}

pub fn insert_stop(conn: &Connection, stop: &BusStop) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bus_stops (id, route_id, name, latitude, longitude, stop_order, arrival_time, departure_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            stop.id,
            stop.route_id,
            stop.name,
            stop.latitude,
            stop.longitude,
            stop.stop_order,
            stop.arrival_time,
            stop.departure_time,
        ],
    )?;
    Ok(())
}

pub fn get_route_stops(conn: &Connection, route_id: &str) -> anyhow::Result<Vec<BusStop>> {
    let mut stmt = conn.prepare(
        "SELECT id, route_id, name, latitude, longitude, stop_order, arrival_time, departure_time
         FROM bus_stops WHERE route_id = ?1 ORDER BY stop_order ASC",
    )?;
    let rows = stmt.query_map(params![route_id], |row| {
        Ok(BusStop {
            id: row.get(0)?,
            route_id: row.get(1)?,
            name: row.get(2)?,
            latitude: row.get(3)?,
            longitude: row.get(4)?,
            stop_order: row.get(5)?,
            arrival_time: row.get(6)?,
            departure_time: row.get(7)?,
        })
    })?;

    let mut stops = vec![];
    for row in rows {
        stops.push(row?);
    }
    Ok(stops)
}

// ── Buses & Seats ──

pub fn insert_bus(conn: &Connection, bus: &Bus) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO buses (id, model, class, capacity) VALUES (?1, ?2, ?3, ?4)",
        params![bus.id, bus.model, bus.class.as_str(), bus.capacity],
    )?;
    Ok(())
}

pub fn insert_seat(conn: &Connection, seat: &Seat) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO seats (id, bus_id, seat_number, seat_type, floor, row_number, column_number, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            seat.id,
            seat.bus_id,
            seat.seat_number,
            seat.seat_type.as_str(),
            seat.floor,
            seat.row,
            seat.column,
            seat.status.as_str(),
        ],
    )?;
    Ok(())
}

const SEAT_COLUMNS: &str =
    "id, bus_id, seat_number, seat_type, floor, row_number, column_number, status";

pub fn get_seats_for_bus(conn: &Connection, bus_id: &str) -> anyhow::Result<Vec<Seat>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SEAT_COLUMNS} FROM seats WHERE bus_id = ?1 ORDER BY floor, row_number, column_number"
    ))?;
    let rows = stmt.query_map(params![bus_id], parse_seat_row)?;

    let mut seats = vec![];
    for row in rows {
        seats.push(row?);
    }
    Ok(seats)
}

/// Only seats that exist and belong to `bus_id` are returned.
pub fn get_seats_by_ids(
    conn: &Connection,
    bus_id: &str,
    seat_ids: &[String],
) -> anyhow::Result<Vec<Seat>> {
    if seat_ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders = (0..seat_ids.len())
        .map(|i| format!("?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {SEAT_COLUMNS} FROM seats WHERE bus_id = ?1 AND id IN ({placeholders})"
    );

    let mut values: Vec<&str> = Vec::with_capacity(seat_ids.len() + 1);
    values.push(bus_id);
    values.extend(seat_ids.iter().map(String::as_str));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), parse_seat_row)?;

    let mut seats = vec![];
    for row in rows {
        seats.push(row?);
    }
    Ok(seats)
}

fn parse_seat_row(row: &rusqlite::Row) -> rusqlite::Result<Seat> {
    let seat_type: String = row.get(3)?;
    let status: String = row.get(7)?;
    Ok(Seat {
        id: row.get(0)?,
        bus_id: row.get(1)?,
        seat_number: row.get(2)?,
        seat_type: SeatType::parse(&seat_type),
        floor: row.get(4)?,
        row: row.get(5)?,
        column: row.get(6)?,
        status: SeatStatus::parse(&status),
    })
}

// ── Schedules ──

pub fn insert_schedule(conn: &Connection, schedule: &Schedule) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO schedules (id, route_id, bus_id, departure_at, arrival_time, seats_available)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            schedule.id,
            schedule.route_id,
            schedule.bus_id,
            format_ts(&schedule.departure_at),
            schedule.arrival_time,
            schedule.seats_available,
        ],
    )?;
    Ok(())
}

const SCHEDULE_DETAIL_SELECT: &str = "SELECT s.id, s.route_id, s.bus_id, s.departure_at, s.arrival_time, s.seats_available,
        r.source, r.destination, r.distance_km, r.estimated_time,
        b.model, b.class, b.capacity
 FROM schedules s
 INNER JOIN routes r ON r.id = s.route_id
 INNER JOIN buses b ON b.id = s.bus_id";

pub fn get_schedule_detail(conn: &Connection, id: &str) -> anyhow::Result<Option<ScheduleDetail>> {
    let detail = conn
        .query_row(
            &format!("{SCHEDULE_DETAIL_SELECT} WHERE s.id = ?1"),
            params![id],
            parse_schedule_detail_row,
        )
        .optional()?;
    Ok(detail)
}

/// Schedules of a route departing on `date` with at least `min_seats` free,
/// earliest departure first.
pub fn find_schedules_on(
    conn: &Connection,
    route_id: &str,
    date: NaiveDate,
    min_seats: i64,
    limit: i64,
) -> anyhow::Result<Vec<ScheduleDetail>> {
    let mut stmt = conn.prepare(&format!(
        "{SCHEDULE_DETAIL_SELECT}
         WHERE s.route_id = ?1 AND date(s.departure_at) = ?2 AND s.seats_available >= ?3
         ORDER BY s.departure_at ASC
         LIMIT ?4"
    ))?;
    let rows = stmt.query_map(
        params![route_id, date.format("%Y-%m-%d").to_string(), min_seats, limit],
        parse_schedule_detail_row,
    )?;

    let mut schedules = vec![];
    for row in rows {
        schedules.push(row?);
    }
    Ok(schedules)
}

fn parse_schedule_detail_row(row: &rusqlite::Row) -> rusqlite::Result<ScheduleDetail> {
    let departure_at: String = row.get(3)?;
    let class: String = row.get(11)?;
    let schedule = Schedule {
        id: row.get(0)?,
        route_id: row.get(1)?,
        bus_id: row.get(2)?,
        departure_at: parse_ts(&departure_at),
        arrival_time: row.get(4)?,
        seats_available: row.get(5)?,
    };
    let route = Route {
        id: schedule.route_id.clone(),
        source: row.get(6)?,
        destination: row.get(7)?,
        distance_km: row.get(8)?,
        estimated_time: row.get(9)?,
    };
    let bus = Bus {
        id: schedule.bus_id.clone(),
        model: row.get(10)?,
        class: BusClass::parse(&class),
        capacity: row.get(12)?,
    };
    Ok(ScheduleDetail {
        schedule,
        route,
        bus,
    })
}

/// Conditional decrement; false when fewer than `seats` remain.
pub fn reserve_capacity(conn: &Connection, schedule_id: &str, seats: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE schedules SET seats_available = seats_available - ?2
         WHERE id = ?1 AND seats_available >= ?2",
        params![schedule_id, seats],
    )?;
    Ok(count > 0)
}

pub fn release_capacity(conn: &Connection, schedule_id: &str, seats: i64) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE schedules SET seats_available = seats_available + ?2 WHERE id = ?1",
        params![schedule_id, seats],
    )?;
    Ok(())
}

// ── Seat Claims ──

/// Conditional claim; false when the seat is already held on this schedule.
pub fn insert_seat_claim(
    conn: &Connection,
    schedule_id: &str,
    seat_id: &str,
    booking_id: &str,
    at: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "INSERT OR IGNORE INTO seat_claims (schedule_id, seat_id, booking_id, claimed_at) VALUES (?1, ?2, ?3, ?4)",
        params![schedule_id, seat_id, booking_id, format_ts(at)],
    )?;
    Ok(count > 0)
}

pub fn delete_seat_claims(conn: &Connection, booking_id: &str) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM seat_claims WHERE booking_id = ?1",
        params![booking_id],
    )?;
    Ok(count)
}

pub fn get_claimed_seat_ids(conn: &Connection, schedule_id: &str) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT seat_id FROM seat_claims WHERE schedule_id = ?1")?;
    let rows = stmt.query_map(params![schedule_id], |row| row.get::<_, String>(0))?;

    let mut ids = vec![];
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "b.id, b.user_id, b.bus_id, b.schedule_id, b.total_fare_cents, b.status, b.payment_status, b.payment_id, b.created_at, b.updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, bus_id, schedule_id, total_fare_cents, status, payment_status, payment_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            booking.id,
            booking.user_id,
            booking.bus_id,
            booking.schedule_id,
            booking.total_fare.cents(),
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.payment_id,
            format_ts(&booking.created_at),
            format_ts(&booking.updated_at),
        ],
    )?;

    for (position, p) in booking.passengers.iter().enumerate() {
        conn.execute(
            "INSERT INTO passengers (booking_id, position, first_name, last_name, age, gender, seat_id, seat_number)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                booking.id,
                position as i64,
                p.first_name,
                p.last_name,
                p.age,
                p.gender.as_str(),
                p.seat_id,
                p.seat_number,
            ],
        )?;
    }
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1"),
            params![id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;

    match booking {
        Some(booking) => {
            let mut booking = booking?;
            booking.passengers = get_passengers(conn, &booking.id)?;
            Ok(Some(booking))
        }
        None => Ok(None),
    }
}

fn get_passengers(conn: &Connection, booking_id: &str) -> anyhow::Result<Vec<Passenger>> {
    let mut stmt = conn.prepare(
        "SELECT first_name, last_name, age, gender, seat_id, seat_number
         FROM passengers WHERE booking_id = ?1 ORDER BY position ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| {
        let gender: String = row.get(3)?;
        Ok(Passenger {
            first_name: row.get(0)?,
            last_name: row.get(1)?,
            age: row.get(2)?,
            gender: Gender::parse(&gender),
            seat_id: row.get(4)?,
            seat_number: row.get(5)?,
        })
    })?;

    let mut passengers = vec![];
    for row in rows {
        passengers.push(row?);
    }
    Ok(passengers)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingFilter {
    All,
    /// Not cancelled and departing after `now`.
    Active,
    /// Departed before `now`, any status.
    Past,
}

pub fn get_bookings_for_user(
    conn: &Connection,
    user_id: &str,
    filter: BookingFilter,
    now: &DateTime<Utc>,
) -> anyhow::Result<Vec<BookingSummary>> {
    let (condition, order) = match filter {
        BookingFilter::All => ("1 = 1", "b.created_at DESC"),
        BookingFilter::Active => (
            "b.status != 'Cancelled' AND s.departure_at >= ?2",
            "s.departure_at ASC",
        ),
        BookingFilter::Past => ("s.departure_at < ?2", "s.departure_at DESC"),
    };
    let sql = format!(
        "SELECT {BOOKING_COLUMNS}, s.departure_at, r.source, r.destination, bu.model
         FROM bookings b
         INNER JOIN schedules s ON s.id = b.schedule_id
         INNER JOIN routes r ON r.id = s.route_id
         INNER JOIN buses bu ON bu.id = b.bus_id
         WHERE b.user_id = ?1 AND {condition}
         ORDER BY {order}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<anyhow::Result<BookingSummary>> = match filter {
        BookingFilter::All => stmt
            .query_map(params![user_id], map_summary_row)?
            .collect::<rusqlite::Result<_>>()?,
        _ => stmt
            .query_map(params![user_id, format_ts(now)], map_summary_row)?
            .collect::<rusqlite::Result<_>>()?,
    };

    let mut summaries = vec![];
    for row in rows {
        summaries.push(row?);
    }

    for summary in &mut summaries {
        summary.booking.passengers = get_passengers(conn, &summary.booking.id)?;
    }
    Ok(summaries)
}

fn map_summary_row(row: &rusqlite::Row) -> rusqlite::Result<anyhow::Result<BookingSummary>> {
    Ok(parse_summary_row(row))
}

fn parse_summary_row(row: &rusqlite::Row) -> anyhow::Result<BookingSummary> {
    let departure_at: String = row.get(10)?;
    Ok(BookingSummary {
        booking: parse_booking_row(row)?,
        departure_at: parse_ts(&departure_at),
        from_location: row.get(11)?,
        to_location: row.get(12)?,
        bus_model: row.get(13)?,
    })
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let status: String = row.get(5)?;
    let payment_status: String = row.get(6)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        bus_id: row.get(2)?,
        schedule_id: row.get(3)?,
        passengers: vec![],
        total_fare: Money::from_cents(row.get(4)?),
        status: BookingStatus::parse(&status),
        payment_status: PaymentStatus::parse(&payment_status),
        payment_id: row.get(7)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

/// Returns the schedule the booking was cancelled on, or None if the booking
/// was missing or already cancelled.
pub fn mark_booking_cancelled(
    conn: &Connection,
    id: &str,
    at: &DateTime<Utc>,
) -> anyhow::Result<Option<String>> {
    let count = conn.execute(
        "UPDATE bookings SET status = 'Cancelled', updated_at = ?2
         WHERE id = ?1 AND status != 'Cancelled'",
        params![id, format_ts(at)],
    )?;
    if count == 0 {
        return Ok(None);
    }

    let schedule_id = conn.query_row(
        "SELECT schedule_id FROM bookings WHERE id = ?1",
        params![id],
        |row| row.get::<_, String>(0),
    )?;
    Ok(Some(schedule_id))
}

/// Compare-and-set on the payment status. Fails (returns false) when the
/// booking is cancelled or its payment status is no longer `expected`.
#[allow(clippy::too_many_arguments)]
pub fn set_payment_status_if(
    conn: &Connection,
    id: &str,
    expected: PaymentStatus,
    payment_status: PaymentStatus,
    status: BookingStatus,
    reference: Option<&str>,
    at: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings
         SET payment_status = ?3, status = ?4, payment_id = COALESCE(?5, payment_id), updated_at = ?6
         WHERE id = ?1 AND payment_status = ?2 AND status != 'Cancelled'",
        params![
            id,
            expected.as_str(),
            payment_status.as_str(),
            status.as_str(),
            reference,
            format_ts(at),
        ],
    )?;
    Ok(count > 0)
}

// ── Payments ──

pub fn insert_payment_event(conn: &Connection, event: &PaymentEvent) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO payment_events (booking_id, reference, status, received_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            event.booking_id,
            event.reference,
            event.status.as_str(),
            format_ts(&event.received_at),
        ],
    )?;
    Ok(())
}

pub fn get_payment_events(conn: &Connection, booking_id: &str) -> anyhow::Result<Vec<PaymentEvent>> {
    let mut stmt = conn.prepare(
        "SELECT booking_id, reference, status, received_at FROM payment_events
         WHERE booking_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| {
        let status: String = row.get(2)?;
        let received_at: String = row.get(3)?;
        Ok(PaymentEvent {
            booking_id: row.get(0)?,
            reference: row.get(1)?,
            status: PaymentStatus::parse(&status),
            received_at: parse_ts(&received_at),
        })
    })?;

    let mut events = vec![];
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

pub fn insert_payment_proof(conn: &Connection, proof: &PaymentProof) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO payment_proofs (id, booking_id, filename, path, content_type, size_bytes, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            proof.id,
            proof.booking_id,
            proof.filename,
            proof.path,
            proof.content_type,
            proof.size_bytes,
            format_ts(&proof.uploaded_at),
        ],
    )?;
    Ok(())
}

pub fn get_payment_proofs(conn: &Connection, booking_id: &str) -> anyhow::Result<Vec<PaymentProof>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, filename, path, content_type, size_bytes, uploaded_at
         FROM payment_proofs WHERE booking_id = ?1 ORDER BY uploaded_at ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| {
        let uploaded_at: String = row.get(6)?;
        Ok(PaymentProof {
            id: row.get(0)?,
            booking_id: row.get(1)?,
            filename: row.get(2)?,
            path: row.get(3)?,
            content_type: row.get(4)?,
            size_bytes: row.get(5)?,
            uploaded_at: parse_ts(&uploaded_at),
        })
    })?;

    let mut proofs = vec![];
    for row in rows {
        proofs.push(row?);
    }
    Ok(proofs)
}

// ── Notifications ──

pub fn get_booking_snapshot(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Option<BookingSnapshot>> {
    let Some(booking) = get_booking(conn, booking_id)? else {
        return Ok(None);
    };

    let journey = conn
        .query_row(
            "SELECT u.email, u.first_name, r.source, r.destination, s.departure_at
             FROM bookings b
             INNER JOIN users u ON u.id = b.user_id
             INNER JOIN schedules s ON s.id = b.schedule_id
             INNER JOIN routes r ON r.id = s.route_id
             WHERE b.id = ?1",
            params![booking_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    Ok(journey.map(
        |(recipient_email, recipient_first_name, from_location, to_location, departure_at)| {
            BookingSnapshot {
                booking_id: booking.id,
                recipient_email,
                recipient_first_name,
                from_location,
                to_location,
                departure_at: parse_ts(&departure_at),
                passengers: booking.passengers,
                total_fare: booking.total_fare,
                payment_status: booking.payment_status,
                payment_id: booking.payment_id,
            }
        },
    ))
}

// ── Health ──

pub fn ping(conn: &Connection) -> bool {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok()
}
