use crate::types::{AlbumRef, ArtistRef, Protocol, Quality, ReleaseInfo, RemoteAlbum};

mod close;

fn sample_album(artist_id: i64, album_ids: &[i64], title: &str) -> RemoteAlbum {
    RemoteAlbum {
        artist: ArtistRef {
            id: artist_id,
            name: format!("Artist {artist_id}"),
            sort_name: None,
        },
        albums: album_ids
            .iter()
            .map(|id| AlbumRef {
                id: *id,
                title: format!("Album {id}"),
                release_date: None,
            })
            .collect(),
        release: ReleaseInfo {
            title: title.to_string(),
            indexer: "Indexer".to_string(),
            protocol: Protocol::Usenet,
            size: 1024,
            publish_date: None,
        },
        quality: Quality {
            id: 6,
            name: "FLAC".to_string(),
        },
    }
}
