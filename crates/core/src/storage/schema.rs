diesel::table! {
    cv_fall_readings (id) {
        id -> Int4,
        video_path -> Text,
        track_id -> Int4,
        start_frame -> Int8,
        frame_index -> Int8,
        timestamp_secs -> Float8,
        confidence -> Float8,
        bbox_x1 -> Float8,
        bbox_y1 -> Float8,
        bbox_x2 -> Float8,
        bbox_y2 -> Float8,
        source -> Text,
        recorded_at -> Timestamptz,
    }
}
